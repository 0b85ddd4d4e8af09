use anyhow::Result;
use console::style;
use std::fmt::{self, Write};

use crate::analyze::Analysis;
use crate::extractors::ExtractionResult;
use crate::utils::display_duration;

/// Format an analysis as plain text, styled for terminals when `styled` is set
pub fn format_as_text(analysis: &Analysis, styled: bool) -> Result<String> {
    let mut out = String::new();
    write_text(&mut out, analysis, styled)?;
    Ok(out)
}

/// Format an analysis as a Markdown document
pub fn format_as_markdown(analysis: &Analysis) -> Result<String> {
    let mut out = String::new();
    write_markdown(&mut out, analysis)?;
    Ok(out)
}

fn write_text(out: &mut impl Write, analysis: &Analysis, styled: bool) -> fmt::Result {
    let recipe = &analysis.recipe;
    let heading = |text: &str| {
        if styled {
            style(text).bold().cyan().to_string()
        } else {
            text.to_string()
        }
    };
    let dim = |text: String| if styled { style(text).dim().to_string() } else { text };

    let title = if styled {
        style(recipe.title.as_str()).bold().green().to_string()
    } else {
        recipe.title.clone()
    };
    writeln!(out, "{}", title)?;
    if !recipe.summary.is_empty() {
        writeln!(out, "{}", recipe.summary)?;
    }
    writeln!(
        out,
        "{}",
        dim(format!(
            "{} | {} | total time: {}",
            recipe.video_url,
            display_duration(&analysis.extraction.video_info.duration),
            if recipe.total_time.is_empty() { "-" } else { recipe.total_time.as_str() }
        ))
    )?;

    writeln!(out, "\n{}", heading("Ingredients"))?;
    for ingredient in &recipe.ingredients {
        writeln!(out, "  • {}", ingredient)?;
    }

    if !recipe.tools.is_empty() {
        writeln!(out, "\n{}", heading("Tools"))?;
        for tool in &recipe.tools {
            writeln!(out, "  • {}", tool)?;
        }
    }

    writeln!(out, "\n{}", heading("Steps"))?;
    for step in &recipe.steps {
        write!(out, "  {}. {}", step.step, step.description)?;
        let details = step_details(step.time.as_deref(), step.temperature.as_deref());
        if !details.is_empty() {
            write!(out, " {}", dim(format!("({})", details)))?;
        }
        writeln!(out)?;
    }

    if !recipe.tips.is_empty() {
        writeln!(out, "\n{}", heading("Tips"))?;
        for tip in &recipe.tips {
            writeln!(out, "  • {}", tip)?;
        }
    }

    write!(
        out,
        "\n{}",
        dim(format!(
            "Transcript: {} chars via {}",
            analysis.extraction.transcript.chars().count(),
            analysis.extraction.method
        ))
    )
}

fn write_markdown(out: &mut impl Write, analysis: &Analysis) -> fmt::Result {
    let recipe = &analysis.recipe;

    writeln!(out, "# {}\n", recipe.title)?;
    if let Some(thumbnail) = &recipe.thumbnail_url {
        writeln!(out, "![{}]({})\n", recipe.title, thumbnail)?;
    }
    if !recipe.summary.is_empty() {
        writeln!(out, "{}\n", recipe.summary)?;
    }
    writeln!(out, "- **Video:** <{}>", recipe.video_url)?;
    if !recipe.total_time.is_empty() {
        writeln!(out, "- **Total time:** {}", recipe.total_time)?;
    }

    writeln!(out, "\n## Ingredients\n")?;
    for ingredient in &recipe.ingredients {
        writeln!(out, "- {}", ingredient)?;
    }

    if !recipe.tools.is_empty() {
        writeln!(out, "\n## Tools\n")?;
        for tool in &recipe.tools {
            writeln!(out, "- {}", tool)?;
        }
    }

    writeln!(out, "\n## Steps\n")?;
    for step in &recipe.steps {
        let details = step_details(step.time.as_deref(), step.temperature.as_deref());
        if details.is_empty() {
            writeln!(out, "{}. {}", step.step, step.description)?;
        } else {
            writeln!(out, "{}. {} _({})_", step.step, step.description, details)?;
        }
    }

    if !recipe.tips.is_empty() {
        writeln!(out, "\n## Tips\n")?;
        for tip in &recipe.tips {
            writeln!(out, "- {}", tip)?;
        }
    }

    write!(
        out,
        "\n---\n_Generated {} from a {} transcript._\n",
        recipe.created_at.format("%Y-%m-%d %H:%M UTC"),
        analysis.extraction.method
    )
}

/// Format an analysis as the JSON response body
pub fn format_as_json(analysis: &Analysis) -> Result<String> {
    Ok(serde_json::to_string_pretty(&analysis.to_response())?)
}

/// Format an extraction result as JSON
pub fn format_extraction_json(result: &ExtractionResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

fn step_details(time: Option<&str>, temperature: Option<&str>) -> String {
    [time, temperature]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ")
}
