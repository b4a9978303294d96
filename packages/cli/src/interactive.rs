//! Menu-driven front end used when no subcommand is given.

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};
use field_radius_cli_utils::MultiProgress;
use field_radius_config::Config;
use field_radius_report::{OutputFormat, Selection};

use crate::commands::{self, Inputs};

enum Action {
    Summary,
    Details,
    Map,
    NearestCity,
    Units,
    Unresolved,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Summary,
        Self::Details,
        Self::Map,
        Self::NearestCity,
        Self::Units,
        Self::Unresolved,
    ];

    const fn label(&self) -> &'static str {
        match self {
            Self::Summary => "Radius of action per specialist",
            Self::Details => "Distance to every served unit",
            Self::Map => "Write GeoJSON map layers",
            Self::NearestCity => "Nearest-city analysis for a unit",
            Self::Units => "List units in a KML document",
            Self::Unresolved => "List unresolved roster units",
        }
    }
}

/// Prompts for an action and its inputs, then runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected action fails.
pub async fn run(config: &Config, multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;
    let action = &Action::ALL[idx];

    match action {
        Action::Units => {
            let kml = prompt_path("KML document")?;
            commands::units(config, &kml, prompt_format()?)
        }
        Action::Summary => {
            let inputs = prompt_inputs()?;
            let selection = prompt_selection()?;
            commands::summary(config, &inputs, &selection, prompt_format()?)
        }
        Action::Details => {
            let inputs = prompt_inputs()?;
            let selection = prompt_selection()?;
            commands::details(config, &inputs, &selection, prompt_format()?)
        }
        Action::Map => {
            let inputs = prompt_inputs()?;
            let selection = prompt_selection()?;
            let output = prompt_path("Output file")?;
            let routes = Confirm::new()
                .with_prompt("Look up road routes?")
                .default(config.routing.enabled)
                .interact()?;
            commands::map(config, &inputs, &selection, &output, routes, multi).await
        }
        Action::NearestCity => {
            let inputs = prompt_inputs()?;
            let cities = prompt_path("City GeoJSON document")?;
            let unit: String = Input::new().with_prompt("Unit name").interact_text()?;
            let count: usize = Input::new()
                .with_prompt("How many nearest cities?")
                .default(config.cities.nearest_count)
                .interact_text()?;
            commands::nearest_city(config, &inputs, &cities, &unit, Some(count), prompt_format()?)
        }
        Action::Unresolved => {
            let inputs = prompt_inputs()?;
            commands::unresolved(config, &inputs, prompt_format()?)
        }
    }
}

fn prompt_inputs() -> Result<Inputs, dialoguer::Error> {
    Ok(Inputs {
        kml: prompt_path("KML document")?,
        roster: prompt_path("Roster spreadsheet")?,
    })
}

fn prompt_path(prompt: &str) -> Result<PathBuf, dialoguer::Error> {
    let text: String = Input::new().with_prompt(prompt).interact_text()?;
    Ok(PathBuf::from(text.trim()))
}

/// Blank answers mean "all".
fn prompt_selection() -> Result<Selection, dialoguer::Error> {
    let ask = |prompt: &str| -> Result<String, dialoguer::Error> {
        Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
    };

    let manager = ask("Manager (empty for all)")?;
    let specialist = ask("Specialist (empty for all)")?;
    let unit = ask("Served unit (empty for all)")?;

    Ok(Selection::from_labels(
        Some(&manager),
        Some(&specialist),
        Some(&unit),
    ))
}

fn prompt_format() -> Result<OutputFormat, dialoguer::Error> {
    const FORMATS: &[(&str, OutputFormat)] = &[
        ("Table", OutputFormat::Table),
        ("CSV", OutputFormat::Csv),
        ("JSON", OutputFormat::Json),
    ];
    let labels: Vec<&str> = FORMATS.iter().map(|(label, _)| *label).collect();

    let idx = Select::new()
        .with_prompt("Output format")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(FORMATS[idx].1)
}
