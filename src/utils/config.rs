#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use log::{info, error, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;
use serde::Deserialize;
use std::{env, fs, path::Path, time::Duration};
use toml;
use lazy_static::lazy_static;
use structopt::StructOpt;

// SWC Utilities
use crate::utils::{swc_utils, errors::Errors};

use super::swc_utils::get_absolute_path;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Directory and file locations. Unless otherwise noted, all files and directories
// are relative to the root directory.
const ENV_SWC_ROOT_DIR     : &str = "SWC_ROOT_DIR";
const DEFAULT_ROOT_DIR     : &str = "~/.swc";
const CONFIG_DIR           : &str = "/config";
const LOGS_DIR             : &str = "/logs";
const LOG4RS_CONFIG_FILE   : &str = "/log4rs.yml"; // relative to config dir
const SWC_CONFIG_FILE      : &str = "/swc.toml";   // relative to config dir
const DEFAULT_LOG_FILE     : &str = "/swc_server.log"; // relative to logs dir

// Networking.
const DEFAULT_HTTP_ADDR    : &str = "http://localhost";
const DEFAULT_HTTP_PORT    : u16  = 3000;

// Upstream character-reference API.
const DEFAULT_SWAPI_URL    : &str = "https://swapi.dev/api/";

// Page assembly.
const DEFAULT_PAGE_TITLE        : &str = "Star Wars Characters";
const DEFAULT_TEMPLATE_FILE     : &str = "index.html";
const DEFAULT_FETCH_TIMEOUT_SECS: u64  = 10;
const DEFAULT_MAX_CONCURRENT    : usize = 4;

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Assign the command line arguments BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref SWC_ARGS: SwcArgs = init_swc_args();
}

// Calculate the data directories BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref SWC_DIRS: SwcDirs = init_swc_dirs();
}

// ***************************************************************************
//                             Directory Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// SwcDirs:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct SwcDirs {
    pub root_dir: String,
    pub config_dir: String,
    pub logs_dir: String,
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// CommandLineArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, StructOpt)]
#[structopt(name = "swc_args", about = "Command line arguments for SWC Server.")]
pub struct SwcArgs {
    /// Specify the server's root data directory.
    ///
    /// This directory contains the configuration and log files the server
    /// uses during execution.
    #[structopt(short, long)]
    pub root_dir: Option<String>,

    /// Create the data directories and then exit.
    ///
    /// The data directories will be rooted at a root directory calculated
    /// using the following priority order:
    ///
    ///   1. If set, the value of the SWC_ROOT_DIR environment,
    ///
    ///   2. Otherwise, if set, the value of the --root_dir command line argument,
    ///
    ///   3. Otherwise, ~/.swc
    ///
    #[structopt(short, long)]
    pub create_dirs_only: bool,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct Parms {
    pub config_file: String,
    pub config: Config,
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct RuntimeCtx {
    pub parms: Parms,
    pub http_client: reqwest::Client,
    pub swc_args: &'static SwcArgs,
    pub swc_dirs: &'static SwcDirs,
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
// Fields missing from the configuration file individually assume their
// default values.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub http_addr: String,
    pub http_port: u16,
    pub swapi_url: String,
    pub template_file: String,
    pub fetch_timeout_secs: u64,
    pub max_concurrent_fetches: usize,
    pub static_home: bool,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: DEFAULT_PAGE_TITLE.to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            swapi_url: DEFAULT_SWAPI_URL.to_string(),
            template_file: DEFAULT_TEMPLATE_FILE.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT,
            static_home: false,
        }
    }
}

// ***************************************************************************
//                            Directory Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_swc_args:
// ---------------------------------------------------------------------------
/** Get the command line arguments. */
fn init_swc_args() -> SwcArgs {
    let args = SwcArgs::from_args();
    println!("{:?}", args);
    args
}

// ---------------------------------------------------------------------------
// init_swc_dirs:
// ---------------------------------------------------------------------------
/** Calculate the external data directories. */
fn init_swc_dirs() -> SwcDirs {
    // Check that each path is absolute and is a directory if it exists.
    // If it doesn't exist, create it.
    let root_dir = get_root_dir();
    check_swc_dir(&root_dir, "root directory");

    let config_dir = root_dir.clone() + CONFIG_DIR;
    check_swc_dir(&config_dir, "config directory");

    let logs_dir = root_dir.clone() + LOGS_DIR;
    check_swc_dir(&logs_dir, "logs directory");

    // Package up and return the directories.
    SwcDirs {
        root_dir, config_dir, logs_dir,
    }
}

// ---------------------------------------------------------------------------
// check_swc_dir:
// ---------------------------------------------------------------------------
/** Check that the path is absolute and, if it exists, that it is a directory.
 * If it doesn't exist, create it.
 *
 * Any failure results in a panic.
 */
fn check_swc_dir(dir: &String, msgname: &str) {
    // Get the path object.
    let path = Path::new(dir);
    if !path.is_absolute() {
        panic!("The SWC {} path must be absolute: {}", msgname, dir);
    }
    if path.exists() {
        // Make sure the path represents a directory.
        if !path.is_dir() {
            panic!("The SWC {} path must be a directory: {}", msgname, dir);
        }
    } else {
        // Create the directory and any missing parents.
        match fs::create_dir_all(path) {
            Ok(_) => (),
            Err(e) => {
                panic!("Make directory error for {:?}: {}", path, &e.to_string());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// get_root_dir:
// ---------------------------------------------------------------------------
fn get_root_dir() -> String {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --root-dir argument
    //  3. Default location
    //
    let root_dir = env::var(ENV_SWC_ROOT_DIR).unwrap_or_else(
        |_| {
            match SWC_ARGS.root_dir.clone() {
                Some(r) => r,
                None => DEFAULT_ROOT_DIR.to_string(),
            }
        });

    // Canonicalize the path.
    get_absolute_path(&root_dir)
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
/** Initialize log4rs from the configuration file if one exists, otherwise
 * fall back to a built-in console and file appender configuration so the
 * server runs without any external log setup.
 */
pub fn init_log() {
    let logconfig = init_log_config();
    if Path::new(&logconfig).is_file() {
        match log4rs::init_file(logconfig.clone(), Default::default()) {
            Ok(_) => (),
            Err(e) => {
                println!("{}", e);
                let s = format!("{}", Errors::Log4rsInitialization(logconfig.clone()));
                panic!("{}", s);
            },
        }
        info!("Log4rs initialized using: {}", logconfig);
    } else {
        init_default_log();
        info!("Log4rs initialized using the built-in configuration.");
    }
}

// ---------------------------------------------------------------------------
// init_log_config:
// ---------------------------------------------------------------------------
fn init_log_config() -> String {
    SWC_DIRS.config_dir.clone() + LOG4RS_CONFIG_FILE
}

// ---------------------------------------------------------------------------
// init_default_log:
// ---------------------------------------------------------------------------
/** Build the fallback logging configuration: INFO and above to the console
 * and to a file in the logs directory.  Panics on failure like the file-based
 * initialization path.
 */
fn init_default_log() {
    let pattern = "{d} {h({l})} {t} - {m}{n}";

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build();

    let logfile_path = SWC_DIRS.logs_dir.clone() + DEFAULT_LOG_FILE;
    let logfile = match FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build(&logfile_path) {
            Ok(f) => f,
            Err(e) => {
                panic!("Unable to create log file {}: {}", logfile_path, e);
            },
        };

    let config = match log4rs::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .build(Root::builder()
                   .appender("stdout")
                   .appender("logfile")
                   .build(LevelFilter::Info)) {
            Ok(c) => c,
            Err(e) => {
                panic!("Unable to build the default log configuration: {}", e);
            },
        };

    if let Err(e) = log4rs::init_config(config) {
        panic!("Unable to initialize the default log configuration: {}", e);
    }
}

/// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from the configuration file in the
 * config data directory.  If the file cannot be read, the compiled-in
 * defaults are used.
 */
fn get_parms() -> Result<Parms> {
    // Get the config file path from its data directory.
    let config_file = SWC_DIRS.config_dir.clone() + SWC_CONFIG_FILE;

    // Read the configuration file.
    let config_file_abs = swc_utils::get_absolute_path(&config_file);
    info!("{}", Errors::ReadingConfigFile(config_file_abs.clone()));
    let contents = match fs::read_to_string(&config_file_abs) {
        Ok(c) => c,
        Err(_) => {
            println!("Unable to read configuration at {}. Using default values.", config_file);
            return Ok(Parms { config_file: Default::default(), config: Config::new() });
        }
    };

    // Parse the toml configuration.
    let config : Config = match toml::from_str(&contents) {
        Ok(c)  => c,
        Err(e) => {
            let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file_abs), e);
            error!("{}", msg);
            return Result::Err(anyhow!(msg));
        }
    };

    Ok(Parms { config_file: config_file_abs, config })
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
pub fn init_runtime_context() -> RuntimeCtx {
    // If either of these fail the application aborts.
    let parms = get_parms().expect("FAILED to read configuration file.");
    let http_client = init_http_client(&parms.config);
    RuntimeCtx {parms, http_client, swc_args: &SWC_ARGS, swc_dirs: &SWC_DIRS}
}

// ---------------------------------------------------------------------------
// init_http_client:
// ---------------------------------------------------------------------------
/** Build the shared outbound HTTP client.  The per-call deadline is applied
 * here once so every upstream request carries it.
 */
fn init_http_client(config: &Config) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.fetch_timeout_secs))
        .build()
        .expect("FAILED to initialize the outbound HTTP client.")
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use crate::utils::config::Config;

    #[test]
    fn print_config() {
        println!("{:?}", Config::new());
    }

    #[test]
    fn default_config_values() {
        let config = Config::new();
        assert_eq!(config.http_port, 3000);
        assert_eq!(config.swapi_url, "https://swapi.dev/api/");
        assert_eq!(config.template_file, "index.html");
        assert!(!config.static_home);
        assert!(config.max_concurrent_fetches >= 1);
    }

    #[test]
    fn partial_toml_overrides() {
        // Missing fields assume their defaults.
        let config: Config = toml::from_str("http_port = 8080\nstatic_home = true").unwrap();
        assert_eq!(config.http_port, 8080);
        assert!(config.static_home);
        assert_eq!(config.swapi_url, "https://swapi.dev/api/");
        assert_eq!(config.title, "Star Wars Characters");
    }

    #[test]
    fn toml_parse_error() {
        let result: Result<Config, _> = toml::from_str("http_port = \"not a number\"");
        assert!(result.is_err());
    }
}
