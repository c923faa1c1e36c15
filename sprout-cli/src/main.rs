//! sprout-cli: identify a plant photo from the terminal
//!
//! Uploads an image to a running `sprout-server` and renders the result.
//!
//! # Subcommands
//! - `identify <path> [--json]`  upload an image and show the plant card
//! - `session [--json]`          show the server's current analysis state
//! - `status`                    show server health

use std::io::IsTerminal;
use std::path::Path;

use clap::{Parser, Subcommand};
use sprout_core::encoder::{sniff_mime, FALLBACK_MIME};
use sprout_core::{PlantInfo, SessionSnapshot, SessionState, SproutResponse};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";

const ITALIC: &str = "\x1b[3m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "sprout-cli", version, about = "Identify plants from photos")]
struct Cli {
    /// Sprout HTTP server URL (overrides SPROUT_HTTP_URL env var)
    #[arg(long, env = "SPROUT_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Upload a plant photo and print what it is
    Identify {
        /// Path to the image file
        path: String,

        /// Print the plant record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the server's current analysis state
    Session {
        /// Print the raw snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show Sprout server status
    Status,
}

// ============================================================================
// Rendering
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Style {
    ansi: bool,
}

impl Style {
    fn wrap(&self, code: &str, text: &str) -> String {
        if self.ansi {
            format!("{}{}{}", code, text, RESET)
        } else {
            text.to_string()
        }
    }

    fn italic(&self, text: &str) -> String {
        self.wrap(ITALIC, text)
    }

    fn bold(&self, text: &str) -> String {
        self.wrap(BOLD, text)
    }
}

/// Name, italic scientific name, four requirement cards, description, care
/// guide, then the characteristics table.
fn render_plant(plant: &PlantInfo, style: Style) -> String {
    let mut out = String::new();

    out.push_str(&format!("{}\n", style.bold(&plant.name)));
    out.push_str(&format!("{}\n\n", style.italic(&plant.scientific_name)));

    for (label, value) in plant.details.cards() {
        out.push_str(&format!("[{}] {}\n", label, value));
    }

    out.push_str(&format!("\n{}\n{}\n", style.bold("Description"), plant.description));
    out.push_str(&format!(
        "\n{}\n{}\n\n",
        style.bold("Care Instructions"),
        plant.care_instructions
    ));

    let rows = plant.details.table_rows();
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    for (label, value) in rows {
        out.push_str(&format!("| {:<width$} | {} |\n", label, value, width = width));
    }

    out
}

fn render_session(snapshot: &SessionSnapshot, style: Style) -> String {
    let state = match snapshot.state {
        SessionState::Idle => "idle",
        SessionState::Analyzing => "analyzing",
        SessionState::HasResult => "has result",
        SessionState::HasError => "has error",
    };

    let mut out = format!("State:    {}\n", state);
    if let Some(id) = snapshot.analysis_id {
        out.push_str(&format!("Analysis: {}\n", id));
    }
    out.push_str(&format!("Updated:  {}\n", snapshot.updated_at.to_rfc3339()));
    if let Some(preview) = &snapshot.preview {
        let header = preview.split(',').next().unwrap_or("");
        out.push_str(&format!("Preview:  {} ({} chars)\n", header, preview.len()));
    }
    if let Some(error) = &snapshot.error {
        out.push_str(&format!("{}\n", error));
    }
    if let Some(plant) = &snapshot.plant {
        out.push('\n');
        out.push_str(&render_plant(plant, style));
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn do_identify(server: &str, path: &str, json_output: bool, style: Style) -> anyhow::Result<()> {
    let bytes = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path, e))?;
    let mime = sniff_mime(&bytes).unwrap_or(FALLBACK_MIME);
    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let part = reqwest::blocking::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime)?;
    let form = reqwest::blocking::multipart::Form::new().part("image", part);

    // No client-side timeout: the server owns the deadline for the model call.
    let client = reqwest::blocking::Client::builder().timeout(None).build()?;

    let url = format!("{}/identify", server);
    let resp = match client.post(&url).multipart(form).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("sprout-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let envelope: SproutResponse = match resp.json() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("sprout-cli: server returned {} with unreadable body: {}", status, e);
            std::process::exit(1);
        }
    };

    let data = match envelope.into_result() {
        Ok(data) => data,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(1);
        }
    };

    let plant: PlantInfo = serde_json::from_value(data["plant"].clone())?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&plant)?);
    } else {
        print!("{}", render_plant(&plant, style));
    }

    Ok(())
}

fn do_session(server: &str, json_output: bool, style: Style) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let url = format!("{}/session", server);
    let snapshot: SessionSnapshot = match client.get(&url).send().and_then(|r| r.json()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("sprout-cli: cannot read session from {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", render_session(&snapshot, style));
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let url = format!("{}/health", server);
    let resp = client.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Sprout server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
            println!("Model:         {}", body["model"].as_str().unwrap_or("?"));
            println!("Policy:        {}", body["in_flight_policy"].as_str().unwrap_or("?"));
            println!("Session:       {}", body["session"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            let status = r.status();
            eprintln!("sprout-cli: server unhealthy (HTTP {})", status);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("sprout-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();
    let style = Style {
        ansi: std::io::stdout().is_terminal(),
    };

    let result = match cli.command {
        Commands::Identify { path, json } => do_identify(&server, &path, json, style),
        Commands::Session { json } => do_session(&server, json, style),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("sprout-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: Style = Style { ansi: false };
    const ANSI: Style = Style { ansi: true };

    fn monstera() -> PlantInfo {
        sprout_core::parse_plant_info(
            r#"{"name":"Monstera","scientificName":"Monstera deliciosa","description":"A climbing aroid.","careInstructions":"Water when the top soil is dry.","details":{"sunlight":"Bright indirect","watering":"Weekly","temperature":"18-27C","soil":"Well-drained","humidity":"High","growthRate":"Fast","maxHeight":"3m","toxicity":"Toxic to pets"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_render_plant_shows_name_and_italic_scientific_name() {
        let out = render_plant(&monstera(), ANSI);
        assert!(out.contains("\x1b[1mMonstera\x1b[0m"));
        assert!(out.contains("\x1b[3mMonstera deliciosa\x1b[0m"));
    }

    #[test]
    fn test_render_plant_has_four_cards() {
        let out = render_plant(&monstera(), PLAIN);
        let cards: Vec<&str> = out.lines().filter(|l| l.starts_with('[')).collect();
        assert_eq!(
            cards,
            vec![
                "[Sunlight] Bright indirect",
                "[Watering] Weekly",
                "[Temperature] 18-27C",
                "[Soil] Well-drained",
            ]
        );
    }

    #[test]
    fn test_render_plant_has_table_rows() {
        let out = render_plant(&monstera(), PLAIN);
        let rows: Vec<&str> = out.lines().filter(|l| l.starts_with('|')).collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], "| Humidity    | High |");
        assert_eq!(rows[1], "| Growth Rate | Fast |");
        assert_eq!(rows[2], "| Max Height  | 3m |");
        assert_eq!(rows[3], "| Toxicity    | Toxic to pets |");
    }

    #[test]
    fn test_render_plant_plain_has_no_escape_codes() {
        let out = render_plant(&monstera(), PLAIN);
        assert!(!out.contains('\x1b'));
        assert!(out.contains("Water when the top soil is dry."));
    }

    #[test]
    fn test_render_plant_accepts_empty_fields() {
        let mut plant = monstera();
        plant.details.toxicity = String::new();
        let out = render_plant(&plant, PLAIN);
        assert!(out.contains("| Toxicity    |  |"));
    }

    #[test]
    fn test_render_session_error_state() {
        let snapshot: SessionSnapshot = serde_json::from_value(serde_json::json!({
            "state": "has_error",
            "analysis_id": "7b5c24ab-1234-4678-9abc-def012345678",
            "preview": "data:image/jpeg;base64,/9j/",
            "plant": null,
            "error": "Error: Failed to parse plant information from API response",
            "updated_at": "2026-10-15T10:00:00Z"
        }))
        .unwrap();

        let out = render_session(&snapshot, PLAIN);
        assert!(out.starts_with("State:    has error\n"));
        assert!(out.contains("Preview:  data:image/jpeg;base64 (27 chars)"));
        assert!(out.contains("Failed to parse plant information"));
    }

    #[test]
    fn test_render_session_with_result_includes_plant() {
        let snapshot = SessionSnapshot {
            state: SessionState::HasResult,
            analysis_id: None,
            preview: None,
            plant: Some(monstera()),
            error: None,
            updated_at: "2026-10-15T10:00:00Z".parse().unwrap(),
        };
        let out = render_session(&snapshot, PLAIN);
        assert!(out.contains("State:    has result"));
        assert!(out.contains("[Sunlight] Bright indirect"));
    }
}
