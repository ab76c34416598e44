use driftscan_core::ThreadingMode;
use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const USAGE: &str = "\
driftscan: index a directory tree by content fingerprint and explain what changed

Usage:
  driftscan index <dir> [--output=PATH] [--phash] [--no-thread] [--no-cache]
  driftscan validate <dir> [--baseline=PATH] [--baseline-listing=PATH]
                           [--current=PATH] [--phash] [--no-thread] [--no-cache]

Options:
  --output=PATH            Where to write the snapshot (default: <dir>/.driftscan.json)
  --baseline=PATH          Stored snapshot to validate against
  --baseline-listing=PATH  rclone lsjson --hash listing to validate against
  --current=PATH           Stored snapshot to use instead of scanning <dir>
  --phash                  Fingerprint image files with the rotation-invariant
                           perceptual hash (requires a build with the phash feature)
  --no-thread              Hash files sequentially
  --no-cache               Ignore the mtime fingerprint cache
  -h, --help               Print this help
  -V, --version            Print the version";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Index(IndexArgs),
    Validate(ValidateArgs),
}

#[derive(Debug, PartialEq, Eq)]
pub struct IndexArgs {
    pub root: PathBuf,
    pub output: Option<PathBuf>,
    pub threading: ThreadingMode,
    pub use_cache: bool,
    pub perceptual_images: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ValidateArgs {
    pub root: PathBuf,
    pub baseline: Option<PathBuf>,
    pub baseline_listing: Option<PathBuf>,
    pub current: Option<PathBuf>,
    pub threading: ThreadingMode,
    pub use_cache: bool,
    pub perceptual_images: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CliError {
    MissingOperation,
    MissingDirectory,
    UnknownOperation(String),
    InvalidFlag(String),
    ConflictingBaselines,
    Help,
    Version,
}

impl Command {
    pub fn from_env() -> Result<Self, CliError> {
        Self::from_iter(env::args().skip(1))
    }

    pub fn from_iter<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        if args.iter().any(|arg| arg == "--help" || arg == "-h") {
            return Err(CliError::Help);
        }
        if args.iter().any(|arg| arg == "--version" || arg == "-V") {
            return Err(CliError::Version);
        }
        let mut args = args.into_iter();
        match args.next() {
            Some(operation) => match operation.as_str() {
                "index" => IndexArgs::parse(args).map(Command::Index),
                "validate" => ValidateArgs::parse(args).map(Command::Validate),
                _ => Err(CliError::UnknownOperation(operation)),
            },
            None => Err(CliError::MissingOperation),
        }
    }
}

impl IndexArgs {
    fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: Iterator<Item = String>,
    {
        let mut root: Option<PathBuf> = None;
        let mut output: Option<PathBuf> = None;
        let mut threading = ThreadingMode::Parallel;
        let mut use_cache = true;
        let mut perceptual_images = false;

        for arg in args {
            if arg.starts_with("--") {
                if arg == "--no-thread" {
                    threading = ThreadingMode::Sequential;
                    continue;
                }
                if arg == "--no-cache" {
                    use_cache = false;
                    continue;
                }
                if arg == "--phash" {
                    perceptual_images = true;
                    continue;
                }
                if let Some(value) = arg.strip_prefix("--output=") {
                    output = Some(PathBuf::from(value));
                    continue;
                }
                return Err(CliError::InvalidFlag(arg));
            }
            if root.is_none() {
                root = Some(PathBuf::from(&arg));
                continue;
            }
            return Err(CliError::InvalidFlag(arg));
        }

        let root = root.ok_or(CliError::MissingDirectory)?;
        Ok(Self {
            root,
            output,
            threading,
            use_cache,
            perceptual_images,
        })
    }
}

impl ValidateArgs {
    fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: Iterator<Item = String>,
    {
        let mut root: Option<PathBuf> = None;
        let mut baseline: Option<PathBuf> = None;
        let mut baseline_listing: Option<PathBuf> = None;
        let mut current: Option<PathBuf> = None;
        let mut threading = ThreadingMode::Parallel;
        let mut use_cache = true;
        let mut perceptual_images = false;

        for arg in args {
            if arg.starts_with("--") {
                if arg == "--no-thread" {
                    threading = ThreadingMode::Sequential;
                    continue;
                }
                if arg == "--no-cache" {
                    use_cache = false;
                    continue;
                }
                if arg == "--phash" {
                    perceptual_images = true;
                    continue;
                }
                if let Some(value) = arg.strip_prefix("--baseline=") {
                    baseline = Some(PathBuf::from(value));
                    continue;
                }
                if let Some(value) = arg.strip_prefix("--baseline-listing=") {
                    baseline_listing = Some(PathBuf::from(value));
                    continue;
                }
                if let Some(value) = arg.strip_prefix("--current=") {
                    current = Some(PathBuf::from(value));
                    continue;
                }
                return Err(CliError::InvalidFlag(arg));
            }
            if root.is_none() {
                root = Some(PathBuf::from(&arg));
                continue;
            }
            return Err(CliError::InvalidFlag(arg));
        }

        let root = root.ok_or(CliError::MissingDirectory)?;
        if baseline.is_some() && baseline_listing.is_some() {
            return Err(CliError::ConflictingBaselines);
        }
        Ok(Self {
            root,
            baseline,
            baseline_listing,
            current,
            threading,
            use_cache,
            perceptual_images,
        })
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingOperation => {
                write!(f, "an operation (index or validate) is required\n\n{}", USAGE)
            }
            Self::MissingDirectory => write!(f, "a directory argument is required"),
            Self::UnknownOperation(operation) => {
                write!(f, "unknown operation: {}", operation)
            }
            Self::InvalidFlag(flag) => write!(f, "unrecognized argument: {}", flag),
            Self::ConflictingBaselines => write!(
                f,
                "--baseline and --baseline-listing cannot be combined"
            ),
            Self::Help => write!(f, "{}", USAGE),
            Self::Version => write!(f, "driftscan {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Error for CliError {}
