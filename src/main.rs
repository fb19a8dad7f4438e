use clap::Parser;
use cohort_client::config::{parse_parameters, Command};
use cohort_client::utils::error::ErrorSeverity;
use cohort_client::utils::{logger, validation::Validate};
use cohort_client::{
    CliConfig, ClientConfig, CohortEngine, CohortEngineClient, CohortError, CohortQuery,
    LocalStorage, MeasureContext, MeasureQuery, Storage,
};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting cohort-client");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ Request failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };

        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(cli: CliConfig) -> Result<(), CohortError> {
    cli.validate()?;

    let config = ClientConfig::from_file(&cli.config)?;
    config.validate()?;

    let client = CohortEngineClient::from_config(&config)?;
    let engine = CohortEngine::from_config(client, &config);
    let storage = LocalStorage::new(".");

    let output = match &cli.command {
        Command::EvaluateCohort {
            cql_dir,
            entrypoint,
            define_to_run,
            patient_ids,
            parameters,
            logging_level,
        } => {
            let query = CohortQuery {
                entrypoint: entrypoint.clone(),
                define_to_run: define_to_run.clone(),
                patient_ids: patient_ids.clone(),
                parameters: parse_parameters(parameters)?,
                logging_level: (*logging_level).into(),
            };
            let results = engine.evaluate_cohort_dir(query, cql_dir).await?;
            serde_json::to_string_pretty(&results)?
        }
        Command::EvaluateMeasure {
            measure_zip,
            patient_ids,
            parameters,
            expand_value_sets,
            search_page_size,
            ..
        } => {
            let selector = cli.command.measure_selector().ok_or_else(|| {
                CohortError::validation("either --measure-id or --identifier is required")
            })?;
            let query = MeasureQuery {
                patient_ids: patient_ids.clone(),
                context: MeasureContext::from_selector(selector, parse_parameters(parameters)?),
                evidence_options: cli.command.evidence_options(),
                expand_value_sets: *expand_value_sets,
                search_page_size: *search_page_size,
            };
            let report = engine
                .evaluate_measure_file(&storage, query, measure_zip)
                .await?;
            serde_json::to_string_pretty(&report)?
        }
        command @ Command::MeasureParameters { .. } => {
            let selector = command.measure_selector().ok_or_else(|| {
                CohortError::validation("either --measure-id or --identifier is required")
            })?;
            let parameters = engine.measure_parameters(&selector).await?;
            serde_json::to_string_pretty(&parameters)?
        }
        Command::CreateValueSet {
            spreadsheet,
            update_if_exists,
        } => {
            let created = engine
                .upload_value_set(&storage, spreadsheet, *update_if_exists)
                .await?;
            serde_json::to_string_pretty(&created)?
        }
    };

    match &cli.output {
        Some(path) => {
            storage.write_file(path, output.as_bytes()).await?;
            tracing::info!("📁 Output saved to: {}", path);
        }
        None => println!("{}", output),
    }

    tracing::info!("✅ Request completed successfully");
    Ok(())
}
