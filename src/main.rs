#![forbid(unsafe_code)]

use lazy_static::lazy_static;
use log::info;
use poem::{listener::TcpListener, Route, Server};
use poem_openapi::OpenApiService;

// SWC Utilities
use crate::v1::swc::characters_page::CharactersPageApi;
use crate::v1::swc::home;
use crate::v1::swc::version::VersionApi;
use crate::utils::config::{init_log, init_runtime_context, RuntimeCtx, SWC_ARGS};
use crate::utils::errors::Errors;

// Modules
mod utils;
mod v1;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "SwcServer"; // for poem logging

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Lazily initialize the parameters variable so that is has a 'static lifetime.
// We also build the shared outbound HTTP client here.  We exit if we can't
// read our parameters.
lazy_static! {
    static ref RUNTIME_CTX: RuntimeCtx = init_runtime_context();
}

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    // --------------- Initialize SWC -----------------
    // Announce ourselves.
    println!("Starting swc_server!");

    // Initialize the server.
    swc_init();

    // --------------- Main Loop Set Up ---------------
    // Create the routes.  The degenerate variant replaces the whole route
    // table with the fixed home endpoint and performs no outbound calls.
    let app = if RUNTIME_CTX.parms.config.static_home {
        info!("Static home mode enabled; serving the fixed response only.");
        Route::new().nest("/", home::static_home_endpoint())
    } else {
        // Assign base URL.
        let swc_url = format!("{}:{}",
            RUNTIME_CTX.parms.config.http_addr,
            RUNTIME_CTX.parms.config.http_port);

        // Create a tuple with the page endpoint and the version endpoint.
        let endpoints = (CharactersPageApi, VersionApi);
        let api_service =
            OpenApiService::new(endpoints, "SWC Server", "0.2.0").server(swc_url);

        // Allow the generated openapi specs to be retrieved from the server.
        let spec = api_service.spec_endpoint();
        let spec_yaml = api_service.spec_endpoint_yaml();
        let ui = api_service.swagger_ui();

        Route::new()
            .at("/spec", spec)
            .at("/spec_yaml", spec_yaml)
            .nest("/ui", ui)
            .nest("/", api_service)
    };

    // ------------------ Main Loop -------------------
    // A bind failure is fatal; nothing else stops the process.
    let addr = format!("{}{}", "0.0.0.0:", RUNTIME_CTX.parms.config.http_port);
    Server::new(TcpListener::bind(addr))
        .name(SERVER_NAME)
        .run(app)
        .await
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// swc_init:
// ---------------------------------------------------------------------------
/** Initializing all subsystems and data structures other than those needed
 * to configure the main loop processor.
 */
fn swc_init() {
    // Configure our log.
    init_log();

    // Force the reading of input parameters and initialization of runtime context.
    info!("{}", Errors::InputParms(format!("{:#?}", *RUNTIME_CTX)));

    // Log build info.
    print_version_info();

    // The --create-dirs-only invocation stops after directory setup, which
    // already ran as a side effect of runtime context initialization.
    if SWC_ARGS.create_dirs_only {
        println!("Data directories created under {}. Exiting.", RUNTIME_CTX.swc_dirs.root_dir);
        std::process::exit(0);
    }
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    // Log build info.
    info!("{}.", format!("\n*** Running SWC={}, BRANCH={}, COMMIT={}, DIRTY={}, RUSTC={}",
                        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
                        env!("GIT_BRANCH"),
                        env!("GIT_COMMIT_SHORT"),
                        env!("GIT_DIRTY"),
                        env!("RUSTC_VERSION")),
    );
}
