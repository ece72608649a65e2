#![forbid(unsafe_code)]

use poem::{endpoint, Endpoint, Request};

// ***************************************************************************
//                                Constants
// ***************************************************************************
// The entire response body of the degenerate variant.
pub const HOME_BODY : &str = "This is home";

// ***************************************************************************
//                             Public Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// static_home_endpoint:
// ---------------------------------------------------------------------------
/** The degenerate variant of the server: a single endpoint that answers the
 * fixed body with status 200 for every path, query and method, and performs
 * no outbound calls.  Built as a plain poem endpoint rather than an OpenAPI
 * one so no method or path restriction applies.
 */
pub fn static_home_endpoint() -> impl Endpoint<Output = &'static str> {
    endpoint::make_sync(|_req: Request| HOME_BODY)
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use poem::http::Method;

    #[test]
    fn fixed_body_text() {
        assert_eq!(HOME_BODY, "This is home");
    }

    #[tokio::test]
    async fn static_home_answers_get() {
        let ep = static_home_endpoint();
        let body = ep.call(Request::default()).await.unwrap();
        assert_eq!(body, HOME_BODY);
    }

    #[tokio::test]
    async fn static_home_answers_any_method_and_path() {
        let ep = static_home_endpoint();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/anything?x=1".parse().unwrap())
            .finish();
        let body = ep.call(req).await.unwrap();
        assert_eq!(body, HOME_BODY);
    }
}
