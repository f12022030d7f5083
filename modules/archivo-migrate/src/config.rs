// Run configuration, resolved once from .env, the process environment and the
// command line (lowest to highest priority).

use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::error::ErrorKind;
use clap::Parser;

use crate::error::{MigrateError, Result};
use crate::layout::SiteLayout;

pub const DEFAULT_YEARS: [i32; 7] = [2011, 2012, 2013, 2014, 2015, 2016, 2017];
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 3000;

pub const DEFAULT_AUTHOR_UID: &str = "legacy-content";
pub const DEFAULT_AUTHOR_NAME: &str = "Archivo historico";
pub const DEFAULT_AUTHOR_EMAIL: &str = "legacy@elalmadelasflores.local";

pub const AUTHOR_UID_ENV: &str = "MIGRATION_AUTHOR_UID";
pub const AUTHOR_NAME_ENV: &str = "MIGRATION_AUTHOR_NAME";
pub const AUTHOR_EMAIL_ENV: &str = "MIGRATION_AUTHOR_EMAIL";
pub const ROOT_ENV: &str = "MIGRATION_ROOT";
pub const PROJECT_ID_ENV: &str = "PUBLIC_FIREBASE_PROJECT_ID";
pub const BUCKET_ENV: &str = "PUBLIC_FIREBASE_STORAGE_BUCKET";
const CLOUD_PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";

#[derive(Debug, Parser)]
#[command(
    name = "archivo-migrate",
    about = "Migrate legacy archive posts (src/pages/archivo/<year>.astro) into Firestore",
    disable_version_flag = true,
    args_override_self = true
)]
pub struct Cli {
    /// Only parse and print a summary; never contacts Firebase
    #[arg(long)]
    pub dry_run: bool,

    /// Overwrite posts that already exist in Firestore
    #[arg(long)]
    pub overwrite: bool,

    /// Years to migrate, comma separated (default 2011..2017)
    #[arg(long, value_name = "Y1,Y2", value_parser = non_empty)]
    pub years: Option<String>,

    /// Firebase project ID (falls back to PUBLIC_FIREBASE_PROJECT_ID)
    #[arg(long, value_name = "ID", value_parser = non_empty)]
    pub project_id: Option<String>,

    /// Storage bucket (falls back to PUBLIC_FIREBASE_STORAGE_BUCKET)
    #[arg(long, value_name = "NAME", value_parser = non_empty)]
    pub bucket: Option<String>,

    /// Service account JSON key; application default credentials otherwise
    #[arg(long, value_name = "PATH", value_parser = non_empty)]
    pub service_account: Option<String>,

    /// authorUid stored on migrated posts
    #[arg(long, value_name = "UID", value_parser = non_empty)]
    pub author_uid: Option<String>,

    /// authorName stored on migrated posts
    #[arg(long, value_name = "NAME", value_parser = non_empty)]
    pub author_name: Option<String>,

    /// authorEmail stored on migrated posts
    #[arg(long, value_name = "EMAIL", value_parser = non_empty)]
    pub author_email: Option<String>,

    /// Site root holding src/pages/archivo and public (default: current directory)
    #[arg(long, value_name = "PATH", value_parser = non_empty)]
    pub root: Option<String>,
}

fn non_empty(raw: &str) -> std::result::Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err("a non-empty value is required".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Environment variables visible to the run. Built from a snapshot rather than
/// read ad hoc so tests can supply their own.
#[derive(Debug, Clone, Default)]
pub struct EnvLayer {
    vars: HashMap<String, String>,
}

impl EnvLayer {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Add values from a dotenv file beneath the current ones: keys already
    /// present keep their value. A missing file is not an error.
    pub fn with_env_file(mut self, path: &Path) -> Result<Self> {
        let entries = match dotenvy::from_path_iter(path) {
            Ok(entries) => entries,
            Err(e) if e.not_found() => return Ok(self),
            Err(e) => {
                return Err(MigrateError::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };

        let mut loaded = 0usize;
        for entry in entries {
            let (key, value) = entry.map_err(|e| {
                MigrateError::Config(format!("malformed {}: {e}", path.display()))
            })?;
            if !self.vars.contains_key(&key) {
                self.vars.insert(key, value);
                loaded += 1;
            }
        }
        tracing::debug!(path = %path.display(), loaded, "Loaded env file");
        Ok(self)
    }

    /// Value for `key`, treating empty strings as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub uid: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct MigrateConfig {
    pub dry_run: bool,
    pub overwrite: bool,
    pub years: Vec<i32>,
    pub project_id: Option<String>,
    pub bucket: Option<String>,
    pub service_account_path: Option<PathBuf>,
    /// `GOOGLE_APPLICATION_CREDENTIALS`, used when no key is given explicitly.
    pub application_credentials: Option<PathBuf>,
    /// `GOOGLE_CLOUD_PROJECT`, the last resort for the project id.
    pub cloud_project: Option<String>,
    pub author: Author,
    pub layout: SiteLayout,
}

pub enum Invocation {
    Help(String),
    Run(MigrateConfig),
}

/// Parse `args` (program name first) and resolve the full configuration.
pub fn parse_invocation<I, T>(args: I, process_env: EnvLayer) -> Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => {
            return Ok(Invocation::Help(e.render().to_string()))
        }
        Err(e) => return Err(MigrateError::Config(e.render().to_string().trim().to_string())),
    };

    let root = cli
        .root
        .clone()
        .or_else(|| process_env.get(ROOT_ENV).map(str::to_string))
        .unwrap_or_else(|| ".".to_string());
    let layout = SiteLayout::new(root);
    let env = process_env.with_env_file(&layout.env_file())?;

    MigrateConfig::resolve(cli, layout, &env).map(Invocation::Run)
}

impl MigrateConfig {
    pub fn resolve(cli: Cli, layout: SiteLayout, env: &EnvLayer) -> Result<Self> {
        let years = match cli.years.as_deref() {
            Some(raw) => parse_years(raw)?,
            None => DEFAULT_YEARS.to_vec(),
        };

        let pick = |flag: Option<String>, key: &str, default: &str| {
            flag.or_else(|| env.get(key).map(str::to_string))
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            dry_run: cli.dry_run,
            overwrite: cli.overwrite,
            years,
            project_id: cli
                .project_id
                .or_else(|| env.get(PROJECT_ID_ENV).map(str::to_string)),
            bucket: cli
                .bucket
                .or_else(|| env.get(BUCKET_ENV).map(str::to_string)),
            service_account_path: cli.service_account.map(PathBuf::from),
            application_credentials: env
                .get(firebase_client::credentials::APPLICATION_CREDENTIALS_ENV)
                .map(PathBuf::from),
            cloud_project: env.get(CLOUD_PROJECT_ENV).map(str::to_string),
            author: Author {
                uid: pick(cli.author_uid, AUTHOR_UID_ENV, DEFAULT_AUTHOR_UID),
                name: pick(cli.author_name, AUTHOR_NAME_ENV, DEFAULT_AUTHOR_NAME),
                email: pick(cli.author_email, AUTHOR_EMAIL_ENV, DEFAULT_AUTHOR_EMAIL),
            },
            layout,
        })
    }

    pub fn log_redacted(&self) {
        fn or_unset(val: &Option<String>) -> &str {
            val.as_deref().unwrap_or("<not set>")
        }

        tracing::info!("Config loaded:");
        tracing::info!("  root: {}", self.layout.root().display());
        tracing::info!("  years: {:?}", self.years);
        tracing::info!("  dry_run: {}  overwrite: {}", self.dry_run, self.overwrite);
        tracing::info!("  project_id: {}", or_unset(&self.project_id));
        tracing::info!("  bucket: {}", or_unset(&self.bucket));
        tracing::info!(
            "  credentials: {}",
            match (&self.service_account_path, &self.application_credentials) {
                (Some(_), _) => "service account key (--service-account)",
                (None, Some(_)) => "GOOGLE_APPLICATION_CREDENTIALS",
                (None, None) => "gcloud application default",
            }
        );
        tracing::info!("  author: {} <{}> ({})", self.author.name, self.author.email, self.author.uid);
    }
}

/// Parse a comma separated year list, keeping values in `[1900, 3000]`.
/// The result is deduplicated and sorted; an empty result is an error.
pub fn parse_years(raw: &str) -> Result<Vec<i32>> {
    let years: BTreeSet<i32> = raw
        .split(',')
        .filter_map(|part| part.trim().parse::<i32>().ok())
        .filter(|year| (MIN_YEAR..=MAX_YEAR).contains(year))
        .collect();

    if years.is_empty() {
        return Err(MigrateError::Config(format!(
            "no valid years in --years ({raw})"
        )));
    }
    Ok(years.into_iter().collect())
}
