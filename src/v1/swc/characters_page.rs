#![forbid(unsafe_code)]

use poem::Request;
use poem_openapi::{ OpenApi, payload::{Html, Json}, ApiResponse };
use anyhow::Result;
use log::error;

use crate::utils::errors::HttpResult;
use crate::utils::render::{self, PageModel};
use crate::utils::swapi;
use crate::utils::swc_utils::{self, RequestDebug, get_absolute_path};

use crate::RUNTIME_CTX;

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct CharactersPageApi;

// The home page takes no parameters; the request record captures the
// upstream settings in effect so they land in the debug log.
struct ReqCharactersPage
{
    swapi_url: String,
    template_file: String,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqCharactersPage {
    type Req = ReqCharactersPage;
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request settings:");
        s.push_str("\n    swapi_url: ");
        s.push_str(&self.swapi_url);
        s.push_str("\n    template_file: ");
        s.push_str(&self.template_file);
        s
    }
}

// ------------------- HTTP Status Codes -------------------
#[derive(ApiResponse)]
enum SwcResponse {
    #[oai(status = 200)]
    Http200(Html<String>),
    #[oai(status = 500)]
    Http500(Json<HttpResult>),
}

fn make_http_200(page: String) -> SwcResponse {
    SwcResponse::Http200(Html(page))
}
fn make_http_500(msg: String) -> SwcResponse {
    SwcResponse::Http500(Json(HttpResult::new(500.to_string(), msg)))
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl CharactersPageApi {
    #[oai(path = "/", method = "get")]
    async fn get_characters_page(&self, http_req: &Request) -> SwcResponse {
        // Package the settings this request will run with.
        let config = &RUNTIME_CTX.parms.config;
        let req = ReqCharactersPage {
            swapi_url: config.swapi_url.clone(),
            template_file: config.template_file.clone(),
        };

        // -------------------- Process Request ----------------------
        match process(http_req, &req).await {
            Ok(r) => r,
            Err(e) => {
                let msg = "ERROR: ".to_owned() + e.to_string().as_str();
                error!("{}", msg);
                make_http_500(msg)
            }
        }
    }
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// process:
// ---------------------------------------------------------------------------
/** Run the full page pipeline: fetch the character list, resolve each home
 * world, assemble the page model and render it.  A list-fetch failure is
 * reported on the page itself rather than aborting the request; a render
 * failure is the only path to a non-200 outcome, and every request gets
 * exactly one outcome.
 */
async fn process(http_req: &Request, req: &ReqCharactersPage) -> Result<SwcResponse> {
    // Conditional logging depending on log level.
    swc_utils::debug_request(http_req, req);

    let client = &RUNTIME_CTX.http_client;
    let config = &RUNTIME_CTX.parms.config;

    // Fetch the character list.  On failure the page renders with zero
    // rows and a visible note; errors were already logged at the site.
    let (characters, page_error) = match swapi::fetch_characters(client, &req.swapi_url).await {
        Ok(list) => (list, None),
        Err(e) => (Vec::new(), Some(e.to_string())),
    };

    // Resolve every home world with the configured concurrency cap.
    // Output order matches list order.
    let enriched = swapi::enrich_characters(client, characters, config.max_concurrent_fetches).await;

    // Assemble and render the page.
    let model = PageModel::new(config.title.clone(), enriched, page_error);
    let template_path = get_absolute_path(&req.template_file);
    match render::render_page(&template_path, &model) {
        Ok(html) => Ok(make_http_200(html)),
        Err(e) => Ok(make_http_500(e.to_string())),
    }
}
