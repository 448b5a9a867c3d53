//! mastery CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "mastery",
    version,
    about = "Student progress tracking and resource recommendations"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset JSON file (overrides the configured data_path)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and sample dataset
    Init,

    /// Record attempt transitions
    Attempt {
        #[command(subcommand)]
        action: AttemptAction,
    },

    /// List attempts, newest first
    Attempts {
        /// Filter by student
        #[arg(long)]
        student: Option<String>,

        /// Filter by indicator
        #[arg(long)]
        indicator: Option<String>,

        /// Maximum number of attempts to show
        #[arg(long)]
        limit: Option<usize>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show a student's progress summaries
    Progress {
        #[arg(long)]
        student: String,

        /// Restrict to one curriculum area
        #[arg(long)]
        area: Option<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Recommend indicators and resources for a student
    Recommend {
        #[arg(long)]
        student: String,

        /// Maximum number of indicators
        #[arg(long)]
        limit_indicators: Option<usize>,

        /// Maximum resources per indicator
        #[arg(long)]
        limit_resources: Option<usize>,

        /// Ranking policy: insertion, lowest_score
        #[arg(long)]
        ranking: Option<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Student, class, or institution analytics
    Analytics {
        #[command(subcommand)]
        scope: AnalyticsScope,
    },

    /// Recompute every progress summary of a student from its attempts
    Reconcile {
        #[arg(long)]
        student: String,
    },
}

#[derive(Subcommand)]
enum AttemptAction {
    /// Start a new attempt
    Start {
        #[arg(long)]
        student: String,

        #[arg(long)]
        indicator: String,

        #[arg(long)]
        resource: Option<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Complete an attempt, or record a new completed one
    Complete {
        #[arg(long)]
        student: String,

        #[arg(long)]
        indicator: String,

        #[arg(long)]
        resource: Option<String>,

        /// Existing attempt to complete
        #[arg(long)]
        attempt: Option<String>,

        /// Score between 0 and 100 (defaults to the configured default_score)
        #[arg(long)]
        score: Option<f64>,

        /// Time spent, in seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Abandon an attempt, or record a new abandoned one
    Abandon {
        #[arg(long)]
        student: String,

        #[arg(long)]
        indicator: String,

        #[arg(long)]
        resource: Option<String>,

        /// Existing attempt to abandon
        #[arg(long)]
        attempt: Option<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum AnalyticsScope {
    /// One student's coverage, scores, and usage
    Student {
        #[arg(long)]
        student: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// All students of one teacher
    Class {
        #[arg(long)]
        teacher: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// The whole institution
    Institution {
        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mastery=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let paths = commands::Paths {
        config: cli.config,
        data: cli.data,
    };

    let result = match cli.command {
        Commands::Init => commands::init::execute(&paths),
        Commands::Attempt { action } => commands::attempt::execute(&paths, action).await,
        Commands::Attempts {
            student,
            indicator,
            limit,
            format,
        } => commands::attempts::execute(&paths, student, indicator, limit, format).await,
        Commands::Progress {
            student,
            area,
            format,
        } => commands::progress::execute(&paths, student, area, format).await,
        Commands::Recommend {
            student,
            limit_indicators,
            limit_resources,
            ranking,
            format,
        } => {
            commands::recommend::execute(
                &paths,
                student,
                limit_indicators,
                limit_resources,
                ranking,
                format,
            )
            .await
        }
        Commands::Analytics { scope } => commands::analytics::execute(&paths, scope).await,
        Commands::Reconcile { student } => commands::reconcile::execute(&paths, student).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
