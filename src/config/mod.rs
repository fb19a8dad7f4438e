pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use self::args::{parse_parameters, CliConfig, Command, DefineReturnArg, LogLevelArg};

#[cfg(feature = "cli")]
mod args {
    use crate::domain::model::{
        DefineReturnOption, LoggingLevel, MeasureEvidenceOptions, MeasureSelector, Parameter,
    };
    use crate::utils::error::{CohortError, Result};
    use crate::utils::validation::{self, Validate};
    use clap::{Parser, Subcommand, ValueEnum};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "cohort-client")]
    #[command(about = "Client for the cohort engine REST API")]
    pub struct CliConfig {
        #[arg(long, short, help = "Path to the client TOML configuration")]
        pub config: PathBuf,

        #[arg(long, help = "Write the JSON result to this file instead of stdout")]
        pub output: Option<String>,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Emit logs as JSON lines")]
        pub log_json: bool,

        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
    pub enum LogLevelArg {
        Na,
        Coverage,
        Trace,
    }

    impl From<LogLevelArg> for LoggingLevel {
        fn from(value: LogLevelArg) -> Self {
            match value {
                LogLevelArg::Na => LoggingLevel::Na,
                LogLevelArg::Coverage => LoggingLevel::Coverage,
                LogLevelArg::Trace => LoggingLevel::Trace,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
    pub enum DefineReturnArg {
        None,
        All,
        Boolean,
    }

    impl From<DefineReturnArg> for DefineReturnOption {
        fn from(value: DefineReturnArg) -> Self {
            match value {
                DefineReturnArg::None => DefineReturnOption::None,
                DefineReturnArg::All => DefineReturnOption::All,
                DefineReturnArg::Boolean => DefineReturnOption::Boolean,
            }
        }
    }

    #[derive(Debug, Clone, Subcommand)]
    pub enum Command {
        /// Evaluate a CQL define for a set of patients
        EvaluateCohort {
            #[arg(long, help = "Directory holding the CQL libraries")]
            cql_dir: PathBuf,

            #[arg(long, help = "CQL library file that holds the define")]
            entrypoint: String,

            #[arg(long = "define")]
            define_to_run: String,

            #[arg(long, value_delimiter = ',', required = true)]
            patient_ids: Vec<String>,

            #[arg(long = "parameter", help = "name=type:value, e.g. MaxAge=integer:65")]
            parameters: Vec<String>,

            #[arg(long, value_enum, default_value = "na")]
            logging_level: LogLevelArg,
        },

        /// Show the parameters a quality measure accepts
        MeasureParameters {
            #[arg(long, conflicts_with = "identifier", required_unless_present = "identifier")]
            measure_id: Option<String>,

            #[arg(long)]
            identifier: Option<String>,

            #[arg(long, requires = "identifier")]
            identifier_system: Option<String>,

            #[arg(long, requires = "identifier")]
            measure_version: Option<String>,
        },

        /// Evaluate a quality measure for one patient or a list of patients
        EvaluateMeasure {
            #[arg(long, help = "Zip archive holding the Measure and Library resources")]
            measure_zip: String,

            #[arg(long, value_delimiter = ',', required = true)]
            patient_ids: Vec<String>,

            #[arg(long, conflicts_with = "identifier", required_unless_present = "identifier")]
            measure_id: Option<String>,

            #[arg(long)]
            identifier: Option<String>,

            #[arg(long, requires = "identifier")]
            identifier_system: Option<String>,

            #[arg(long, requires = "identifier")]
            measure_version: Option<String>,

            #[arg(long = "parameter", help = "name=type:value, e.g. MaxAge=integer:65")]
            parameters: Vec<String>,

            #[arg(long)]
            include_evaluated_resources: bool,

            #[arg(long, value_enum, default_value = "none")]
            define_return: DefineReturnArg,

            #[arg(long)]
            expand_value_sets: Option<bool>,

            #[arg(long)]
            search_page_size: Option<u32>,
        },

        /// Insert a value set spreadsheet, or update it in place
        CreateValueSet {
            #[arg(long)]
            spreadsheet: String,

            #[arg(long)]
            update_if_exists: bool,
        },
    }

    impl Command {
        pub fn measure_selector(&self) -> Option<MeasureSelector> {
            match self {
                Command::MeasureParameters {
                    measure_id,
                    identifier,
                    identifier_system,
                    measure_version,
                }
                | Command::EvaluateMeasure {
                    measure_id,
                    identifier,
                    identifier_system,
                    measure_version,
                    ..
                } => match (measure_id, identifier) {
                    (Some(id), _) => Some(MeasureSelector::Id(id.clone())),
                    (None, Some(value)) => Some(MeasureSelector::Identifier {
                        value: value.clone(),
                        system: identifier_system.clone(),
                        version: measure_version.clone(),
                    }),
                    (None, None) => None,
                },
                _ => None,
            }
        }

        /// Evidence options for `evaluate-measure`; `None` when nothing was asked for.
        pub fn evidence_options(&self) -> Option<MeasureEvidenceOptions> {
            match self {
                Command::EvaluateMeasure {
                    include_evaluated_resources,
                    define_return,
                    ..
                } if *include_evaluated_resources || *define_return != DefineReturnArg::None => {
                    Some(MeasureEvidenceOptions {
                        include_evaluated_resources: *include_evaluated_resources,
                        define_return_option: (*define_return).into(),
                    })
                }
                _ => None,
            }
        }
    }

    /// Parses repeated `name=type:value` arguments.
    pub fn parse_parameters(raw: &[String]) -> Result<BTreeMap<String, Parameter>> {
        raw.iter()
            .map(|arg| -> Result<(String, Parameter)> {
                let (name, value) = arg
                    .split_once('=')
                    .ok_or_else(|| {
                        CohortError::validation(format!("parameter '{}' must be name=type:value", arg))
                    })?;
                let parameter = Parameter::parse(value).ok_or_else(|| {
                    CohortError::validation(format!("cannot parse parameter value '{}'", value))
                })?;
                Ok((name.trim().to_string(), parameter))
            })
            .collect()
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            if let Some(output) = &self.output {
                validation::validate_path("output", output)?;
            }
            match &self.command {
                Command::EvaluateCohort {
                    entrypoint,
                    define_to_run,
                    parameters,
                    ..
                } => {
                    validation::validate_file_extension("entrypoint", entrypoint, &["cql"])?;
                    validation::validate_non_empty_string("define", define_to_run)?;
                    parse_parameters(parameters)?;
                }
                Command::EvaluateMeasure {
                    measure_zip,
                    parameters,
                    search_page_size,
                    ..
                } => {
                    validation::validate_file_extension("measure_zip", measure_zip, &["zip"])?;
                    parse_parameters(parameters)?;
                    if let Some(size) = search_page_size {
                        validation::validate_range("search_page_size", *size, 1, 10_000)?;
                    }
                }
                Command::MeasureParameters { .. } => {}
                Command::CreateValueSet { spreadsheet, .. } => {
                    validation::validate_file_extension("spreadsheet", spreadsheet, &["xlsx", "xls"])?;
                }
            }
            Ok(())
        }
    }

}
