//! BioLens - offline-first diagnostic assistant CLI
//!
//! The `biolens` command records clinical cases on local storage and runs
//! the staged diagnostic pipeline against the configured model endpoint.
//!
//! ## Commands
//!
//! - `case create`: Open a case for a patient
//! - `case attach-image`: Add a photo to a case
//! - `case attach-audio`: Add a spoken symptom description to a case
//! - `diagnose`: Run the pipeline and annotate the case
//! - `show`: Print a stored case
//! - `unsynced`: List cases not yet pushed to the cloud

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use uuid::Uuid;

use biolens_core::{
    AudioUpload, BiolensConfig, CaseService, DiagnosticOrchestrator, GeminiTransport,
    ImageUpload, NewCase, ResilientCaller, METRICS,
};
use biolens_domain::{
    AgeUnit, BiologicalSex, CaseId, ContextualInformation, FacilityLevel, FsCaseRepository,
    FsMediaStore, GeographicRegion, ImageType,
};

#[derive(Parser)]
#[command(name = "biolens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "BioLens diagnostic assistant", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Local storage directory for cases and media
    #[arg(long, global = true, env = "BIOLENS_DATA_DIR", default_value = ".biolens")]
    data_dir: PathBuf,

    /// Optional TOML configuration file
    #[arg(long, global = true, env = "BIOLENS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create cases and attach media
    Case {
        #[command(subcommand)]
        action: CaseAction,
    },

    /// Run the diagnostic pipeline on a case
    Diagnose {
        /// Case ID
        case_id: CaseId,
    },

    /// Print a stored case as JSON
    Show {
        /// Case ID
        case_id: CaseId,
    },

    /// List cases not yet synced to the cloud
    Unsynced,
}

#[derive(Subcommand)]
enum CaseAction {
    /// Open a new case
    Create {
        /// Anonymised patient identifier
        #[arg(long)]
        patient: String,

        /// Patient age
        #[arg(long)]
        age: Option<u32>,

        /// Unit of the age value
        #[arg(long, default_value = "years")]
        age_unit: AgeUnit,

        /// Biological sex
        #[arg(long, default_value = "unknown")]
        sex: BiologicalSex,

        /// Health worker opening the case (random if omitted)
        #[arg(long)]
        worker: Option<Uuid>,

        #[arg(long)]
        country: String,

        #[arg(long)]
        region: String,

        /// Facility level
        #[arg(long, default_value = "rural-clinic")]
        facility: FacilityLevel,

        /// Medication available at the facility (repeatable)
        #[arg(long = "medication")]
        medications: Vec<String>,

        /// Disease endemic to the region (repeatable)
        #[arg(long = "endemic")]
        endemic_diseases: Vec<String>,

        /// Patient's primary language
        #[arg(long, default_value = "en")]
        language: String,
    },

    /// Attach a JPEG image to a case
    AttachImage {
        case_id: CaseId,

        /// Path to the image file
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long, default_value = "other")]
        image_type: ImageType,

        #[arg(long, default_value = "0")]
        width: u32,

        #[arg(long, default_value = "0")]
        height: u32,

        #[arg(long, default_value = "unknown")]
        device: String,
    },

    /// Attach a symptom description to a case
    AttachAudio {
        case_id: CaseId,

        /// Language code of the description
        #[arg(long, default_value = "en")]
        language: String,

        /// Transcript of the description
        #[arg(long)]
        transcript: Option<String>,

        /// Path to a WAV recording
        #[arg(long)]
        recording: Option<PathBuf>,

        /// Recording length in seconds
        #[arg(long, default_value = "0")]
        duration: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    biolens_core::init_tracing(cli.json, level);

    let config =
        BiolensConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let service = build_service(&cli.data_dir, config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    let result = match cli.command {
        Commands::Case { action } => match action {
            CaseAction::Create {
                patient,
                age,
                age_unit,
                sex,
                worker,
                country,
                region,
                facility,
                medications,
                endemic_diseases,
                language,
            } => {
                let region = GeographicRegion::new(country, region);
                let context = ContextualInformation::new(region, facility)
                    .with_medications(medications)
                    .with_endemic_diseases(endemic_diseases)
                    .with_language(language);
                let new_case = NewCase {
                    patient_anonymized_id: patient,
                    age,
                    age_unit,
                    sex,
                    healthcare_worker_id: worker.unwrap_or_else(Uuid::new_v4),
                    context,
                };
                cmd_case_create(&service, new_case).await
            }
            CaseAction::AttachImage {
                case_id,
                file,
                image_type,
                width,
                height,
                device,
            } => {
                cmd_attach_image(&service, case_id, &file, image_type, width, height, device).await
            }
            CaseAction::AttachAudio {
                case_id,
                language,
                transcript,
                recording,
                duration,
            } => {
                cmd_attach_audio(
                    &service,
                    case_id,
                    language,
                    transcript,
                    recording.as_deref(),
                    duration,
                )
                .await
            }
        },
        Commands::Diagnose { case_id } => cmd_diagnose(&service, case_id, &cancel).await,
        Commands::Show { case_id } => cmd_show(&service, case_id).await,
        Commands::Unsynced => cmd_unsynced(&service).await,
    };

    METRICS.flush();
    result
}

fn build_service(data_dir: &Path, config: BiolensConfig) -> Result<CaseService> {
    let cases = Arc::new(
        FsCaseRepository::new(data_dir)
            .with_context(|| format!("Failed to open case store in {:?}", data_dir))?,
    );
    let media = Arc::new(
        FsMediaStore::new(data_dir)
            .with_context(|| format!("Failed to open media store in {:?}", data_dir))?,
    );

    if config.model.api_key.is_none() {
        warn!("no API key configured; diagnose requests will be rejected by the endpoint");
    }
    let generation = config.model.generation.clone();
    let transport = Arc::new(
        GeminiTransport::new(config.model).context("Failed to build model transport")?,
    );
    let caller = Arc::new(ResilientCaller::named("gemini", transport, config.resilience));
    let orchestrator = DiagnosticOrchestrator::new(caller, generation, cases.clone(), media.clone())
        .with_config(config.pipeline);

    Ok(CaseService::new(cases, media, orchestrator))
}

async fn cmd_case_create(service: &CaseService, new_case: NewCase) -> Result<()> {
    let case = service
        .create_case(new_case)
        .await
        .context("Failed to create case")?;
    println!("{}", case.id());
    Ok(())
}

async fn cmd_attach_image(
    service: &CaseService,
    case_id: CaseId,
    file: &Path,
    image_type: ImageType,
    width: u32,
    height: u32,
    device_model: String,
) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read image {:?}", file))?;
    let image = service
        .attach_image(
            case_id,
            ImageUpload {
                bytes,
                image_type,
                width,
                height,
                device_model,
            },
        )
        .await
        .with_context(|| format!("Failed to attach image to case {}", case_id))?;
    println!("{}", image.id);
    Ok(())
}

async fn cmd_attach_audio(
    service: &CaseService,
    case_id: CaseId,
    language_code: String,
    transcript: Option<String>,
    recording: Option<&Path>,
    duration_seconds: u32,
) -> Result<()> {
    if transcript.is_none() && recording.is_none() {
        anyhow::bail!("Provide --transcript, --recording, or both");
    }
    let recording = recording
        .map(|path| {
            std::fs::read(path).with_context(|| format!("Failed to read recording {:?}", path))
        })
        .transpose()?;

    let audio = service
        .attach_audio(
            case_id,
            AudioUpload {
                language_code,
                transcript,
                recording,
                duration_seconds,
            },
        )
        .await
        .with_context(|| format!("Failed to attach audio to case {}", case_id))?;
    println!("{}", audio.id);
    Ok(())
}

async fn cmd_diagnose(
    service: &CaseService,
    case_id: CaseId,
    cancel: &CancellationToken,
) -> Result<()> {
    let outcome = service
        .request_diagnosis(case_id, cancel)
        .await
        .with_context(|| format!("Diagnosis failed for case {}", case_id))?;

    if outcome.needs_review() {
        warn!(case_id = %case_id, "model output was unstructured; clinician review required");
    }
    info!(case_id = %case_id, duration_ms = outcome.duration_ms, "diagnosis complete");
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn cmd_show(service: &CaseService, case_id: CaseId) -> Result<()> {
    let case = service
        .get_case(case_id)
        .await
        .with_context(|| format!("Failed to load case {}", case_id))?;
    println!("{}", serde_json::to_string_pretty(&case)?);
    Ok(())
}

async fn cmd_unsynced(service: &CaseService) -> Result<()> {
    let cases = service
        .unsynced_cases()
        .await
        .context("Failed to list unsynced cases")?;
    if cases.is_empty() {
        println!("All cases synced.");
        return Ok(());
    }
    for case in cases {
        println!("{}  {}  {}", case.id(), case.status(), case.created_at().to_rfc3339());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn sample_case() -> NewCase {
        NewCase {
            patient_anonymized_id: "PAT-CLI-1".to_string(),
            age: Some(3),
            age_unit: AgeUnit::Years,
            sex: BiologicalSex::Female,
            healthcare_worker_id: Uuid::new_v4(),
            context: ContextualInformation::new(
                GeographicRegion::new("Malawi", "Zomba"),
                FacilityLevel::BasicHealthPost,
            ),
        }
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_enum_flags_accept_kebab_case() {
        let cli = Cli::try_parse_from([
            "biolens",
            "case",
            "create",
            "--patient",
            "PAT-9",
            "--country",
            "Malawi",
            "--region",
            "Zomba",
            "--facility",
            "district-hospital",
            "--sex",
            "female",
            "--medication",
            "ORS",
            "--medication",
            "Zinc",
        ])
        .unwrap();
        match cli.command {
            Commands::Case {
                action:
                    CaseAction::Create {
                        facility,
                        sex,
                        medications,
                        ..
                    },
            } => {
                assert_eq!(facility, FacilityLevel::DistrictHospital);
                assert_eq!(sex, BiologicalSex::Female);
                assert_eq!(medications, vec!["ORS", "Zinc"]);
            }
            _ => panic!("expected case create"),
        }
    }

    #[tokio::test]
    async fn test_attach_commands_persist_to_data_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let service = build_service(temp_dir.path(), BiolensConfig::default()).unwrap();
        let case = service.create_case(sample_case()).await.unwrap();

        let image_path = temp_dir.path().join("rash.jpg");
        std::fs::write(&image_path, b"\xFF\xD8\xFFjpeg").unwrap();
        cmd_attach_image(
            &service,
            case.id(),
            &image_path,
            ImageType::Rash,
            800,
            600,
            "field-phone".to_string(),
        )
        .await
        .unwrap();
        cmd_attach_audio(
            &service,
            case.id(),
            "en".to_string(),
            Some("itching for a week".to_string()),
            None,
            0,
        )
        .await
        .unwrap();

        // a fresh service over the same directory sees the stored case
        let reopened = build_service(temp_dir.path(), BiolensConfig::default()).unwrap();
        let stored = reopened.get_case(case.id()).await.unwrap();
        assert_eq!(stored.images().len(), 1);
        assert_eq!(
            stored
                .audio_description()
                .and_then(|a| a.transcribed_text.as_deref()),
            Some("itching for a week")
        );
    }

    #[tokio::test]
    async fn test_attach_audio_requires_some_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let service = build_service(temp_dir.path(), BiolensConfig::default()).unwrap();
        let case = service.create_case(sample_case()).await.unwrap();

        let result = cmd_attach_audio(&service, case.id(), "en".to_string(), None, None, 0).await;
        assert!(result.is_err());
    }
}
