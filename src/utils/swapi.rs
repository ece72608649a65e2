#![forbid(unsafe_code)]

use futures::stream::{self, StreamExt};
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::utils::errors::Errors;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Resource path of the character list, relative to the API base URL.
const PEOPLE_RESOURCE : &str = "people";

// ***************************************************************************
//                               Record Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// PlanetRecord:
// ---------------------------------------------------------------------------
/// A planet as returned by the upstream API.  The population is text because
/// the API uses placeholders like "unknown".  Fields the upstream omits
/// decode to empty strings rather than failing the record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetRecord {
    pub name: String,
    pub population: String,
    pub terrain: String,
}

// ---------------------------------------------------------------------------
// CharacterRecord:
// ---------------------------------------------------------------------------
/// A character summary from the upstream list response.  The home world is
/// referenced by URL and resolved separately.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CharacterRecord {
    pub name: String,
    #[serde(rename = "homeworld")]
    pub home_world_url: String,
}

// ---------------------------------------------------------------------------
// CharacterListResult:
// ---------------------------------------------------------------------------
/// The upstream list wrapper.  Order of the results array is preserved.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CharacterListResult {
    pub results: Vec<CharacterRecord>,
}

// ---------------------------------------------------------------------------
// EnrichedCharacter:
// ---------------------------------------------------------------------------
/// The per-character enrichment outcome handed to the page renderer.  A
/// character either carries its resolved home world or the reason the
/// resolution failed, never both.
#[derive(Debug, Serialize)]
pub struct EnrichedCharacter {
    pub name: String,
    pub home_world_url: String,
    pub home_world: Option<PlanetRecord>,
    pub fetch_error: Option<String>,
}

// ***************************************************************************
//                             Public Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// fetch_characters:
// ---------------------------------------------------------------------------
/** Issue one GET for the character-list resource and decode the ordered
 * records out of the wrapper object.  Each failure stage maps to its own
 * error variant and is logged here before returning.
 */
pub async fn fetch_characters(client: &Client, base_url: &str) -> Result<Vec<CharacterRecord>, Errors> {
    let url = join_url(base_url, PEOPLE_RESOURCE);
    let list: CharacterListResult = get_json(client, &url).await?;
    Ok(list.results)
}

// ---------------------------------------------------------------------------
// resolve_home_world:
// ---------------------------------------------------------------------------
/** Issue one GET for a character's home-world resource and decode the
 * planet record.  Same failure policy as fetch_characters.
 */
pub async fn resolve_home_world(client: &Client, home_world_url: &str) -> Result<PlanetRecord, Errors> {
    get_json(client, home_world_url).await
}

// ---------------------------------------------------------------------------
// enrich_characters:
// ---------------------------------------------------------------------------
/** Resolve every character's home world with a bounded-concurrency fan-out.
 * At most max_concurrent resolutions are in flight at once and the output
 * order always matches the input order.  A failed resolution yields a record
 * with no planet and the failure reason; it never aborts the batch.
 */
pub async fn enrich_characters(client: &Client,
                               characters: Vec<CharacterRecord>,
                               max_concurrent: usize) -> Vec<EnrichedCharacter> {
    let limit = max_concurrent.max(1);
    stream::iter(characters.into_iter().map(|character| async move {
        match resolve_home_world(client, &character.home_world_url).await {
            Ok(planet) => EnrichedCharacter {
                name: character.name,
                home_world_url: character.home_world_url,
                home_world: Some(planet),
                fetch_error: None,
            },
            Err(e) => EnrichedCharacter {
                name: character.name,
                home_world_url: character.home_world_url,
                home_world: None,
                fetch_error: Some(e.to_string()),
            },
        }
    }))
    .buffered(limit)
    .collect()
    .await
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// join_url:
// ---------------------------------------------------------------------------
/** Append a resource name to the base URL, tolerating a missing trailing
 * slash in the configured base.
 */
fn join_url(base_url: &str, resource: &str) -> String {
    if base_url.ends_with('/') {
        base_url.to_string() + resource
    } else {
        base_url.to_string() + "/" + resource
    }
}

// ---------------------------------------------------------------------------
// get_json:
// ---------------------------------------------------------------------------
/** GET the url and decode the JSON body.  Request errors, non-success
 * statuses, body-read errors and decode errors are distinguished so the
 * caller can report exactly what went wrong.
 */
async fn get_json<T: serde::de::DeserializeOwned>(client: &Client, url: &str) -> Result<T, Errors> {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            let err = Errors::UpstreamRequestError(url.to_string(), e.to_string());
            error!("{}", err);
            return Err(err);
        },
    };

    let status = response.status();
    if !status.is_success() {
        let err = Errors::UpstreamStatusError(url.to_string(), status.as_u16());
        error!("{}", err);
        return Err(err);
    }

    let body = match response.text().await {
        Ok(b) => b,
        Err(e) => {
            let err = Errors::UpstreamBodyError(url.to_string(), e.to_string());
            error!("{}", err);
            return Err(err);
        },
    };

    match serde_json::from_str::<T>(&body) {
        Ok(v) => Ok(v),
        Err(e) => {
            let err = Errors::UpstreamDecodeError(url.to_string(), e.to_string());
            error!("{}", err);
            Err(err)
        },
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const LUKE_LIST: &str =
        r#"{"results":[{"name":"Luke Skywalker","homeworld":"http://x/planets/1/"}]}"#;

    // ------------------------ decode tests ------------------------
    #[test]
    fn decode_character_list() {
        let list: CharacterListResult = serde_json::from_str(LUKE_LIST).unwrap();
        assert_eq!(list.results.len(), 1);
        assert_eq!(list.results[0].name, "Luke Skywalker");
        assert_eq!(list.results[0].home_world_url, "http://x/planets/1/");
    }

    #[test]
    fn decode_empty_character_list() {
        let list: CharacterListResult = serde_json::from_str(r#"{"results":[]}"#).unwrap();
        assert!(list.results.is_empty());
    }

    #[test]
    fn decode_preserves_order() {
        let body = r#"{"results":[
            {"name":"a","homeworld":"http://x/planets/1/"},
            {"name":"b","homeworld":"http://x/planets/2/"},
            {"name":"c","homeworld":"http://x/planets/3/"}]}"#;
        let list: CharacterListResult = serde_json::from_str(body).unwrap();
        let names: Vec<&str> = list.results.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn decode_partial_record() {
        // Missing fields decode to empty strings instead of failing.
        let list: CharacterListResult =
            serde_json::from_str(r#"{"results":[{"name":"R2-D2"}]}"#).unwrap();
        assert_eq!(list.results[0].name, "R2-D2");
        assert!(list.results[0].home_world_url.is_empty());
    }

    #[test]
    fn decode_malformed_body() {
        let result: Result<CharacterListResult, _> = serde_json::from_str("not json at all");
        assert!(result.is_err());
    }

    #[test]
    fn decode_planet() {
        let planet: PlanetRecord = serde_json::from_str(
            r#"{"name":"Tatooine","population":"200000","terrain":"desert"}"#).unwrap();
        assert_eq!(planet.name, "Tatooine");
        assert_eq!(planet.population, "200000");
        assert_eq!(planet.terrain, "desert");
    }

    #[test]
    fn join_url_with_and_without_slash() {
        assert_eq!(join_url("http://x/api/", "people"), "http://x/api/people");
        assert_eq!(join_url("http://x/api", "people"), "http://x/api/people");
    }

    // ------------------------ mock upstream ------------------------
    // A canned HTTP/1.1 upstream on a local port.  Each connection gets one
    // response selected by request path, then the connection is closed.
    async fn spawn_mock_upstream() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(s) => s,
                    Err(_) => break,
                };
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let mut total = 0;
                    loop {
                        let n = match socket.read(&mut buf[total..]).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => n,
                        };
                        total += n;
                        if buf[..total].windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                        if total == buf.len() {
                            break;
                        }
                    }
                    let request = String::from_utf8_lossy(&buf[..total]).to_string();
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let (status, body) = route_mock(&path);
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status, body.len(), body);
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        addr
    }

    fn route_mock(path: &str) -> (&'static str, String) {
        if path == "/api/people" {
            let body = r#"{"results":[
                {"name":"Luke Skywalker","homeworld":"__BASE__/planets/1/"},
                {"name":"Leia Organa","homeworld":"__BASE__/planets/2/"},
                {"name":"Unknown","homeworld":"__BASE__/planets/404/"}]}"#;
            // The list body carries absolute planet URLs pointing back at
            // this mock; the caller substitutes the real base.
            ("200 OK", body.to_string())
        } else if path.contains("/planets/1") {
            ("200 OK",
             r#"{"name":"Tatooine","population":"200000","terrain":"desert"}"#.to_string())
        } else if path.contains("/planets/2") {
            ("200 OK",
             r#"{"name":"Alderaan","population":"2000000000","terrain":"grasslands, mountains"}"#.to_string())
        } else if path.contains("/broken") {
            ("200 OK", "this is not json".to_string())
        } else {
            ("404 Not Found", r#"{"detail":"Not found"}"#.to_string())
        }
    }

    fn test_client() -> Client {
        Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    // ------------------------ end-to-end tests ------------------------
    #[tokio::test]
    async fn fetch_and_enrich_preserves_order() {
        let addr = spawn_mock_upstream().await;
        let client = test_client();
        let base = format!("http://{}/api/", addr);

        let mut characters = fetch_characters(&client, &base).await.unwrap();
        assert_eq!(characters.len(), 3);

        // Point the embedded planet references at the mock listener.
        for c in &mut characters {
            c.home_world_url = c.home_world_url.replace("__BASE__", &format!("http://{}", addr));
        }

        let enriched = enrich_characters(&client, characters, 2).await;
        assert_eq!(enriched.len(), 3);

        // Order matches the list response.
        assert_eq!(enriched[0].name, "Luke Skywalker");
        assert_eq!(enriched[1].name, "Leia Organa");
        assert_eq!(enriched[2].name, "Unknown");

        // The first two resolved, the third failed on a 404 and kept the reason.
        assert_eq!(enriched[0].home_world.as_ref().unwrap().name, "Tatooine");
        assert!(enriched[0].fetch_error.is_none());
        assert_eq!(enriched[1].home_world.as_ref().unwrap().name, "Alderaan");
        assert!(enriched[2].home_world.is_none());
        assert!(enriched[2].fetch_error.as_ref().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn fetch_characters_non_success_status() {
        let addr = spawn_mock_upstream().await;
        let client = test_client();
        let base = format!("http://{}/missing/", addr);

        let result = fetch_characters(&client, &base).await;
        match result {
            Err(Errors::UpstreamStatusError(_, status)) => assert_eq!(status, 404),
            other => panic!("unexpected result: {:?}", other.map(|v| v.len())),
        }
    }

    #[tokio::test]
    async fn resolve_home_world_decode_error() {
        let addr = spawn_mock_upstream().await;
        let client = test_client();
        let url = format!("http://{}/broken", addr);

        let result = resolve_home_world(&client, &url).await;
        assert!(matches!(result, Err(Errors::UpstreamDecodeError(_, _))));
    }

    #[tokio::test]
    async fn enrich_unreachable_home_world() {
        let client = test_client();
        let characters = vec![CharacterRecord {
            name: "Lost".to_string(),
            home_world_url: "http://127.0.0.1:1/planets/1/".to_string(),
        }];

        let enriched = enrich_characters(&client, characters, 4).await;
        assert_eq!(enriched.len(), 1);
        assert!(enriched[0].home_world.is_none());
        assert!(enriched[0].fetch_error.is_some());
    }

    #[tokio::test]
    async fn enrich_empty_list() {
        let client = test_client();
        let enriched = enrich_characters(&client, vec![], 4).await;
        assert!(enriched.is_empty());
    }
}
