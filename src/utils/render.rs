#![forbid(unsafe_code)]

use log::error;
use serde::Serialize;
use std::fs;
use tera::{Context, Tera};

use crate::utils::errors::Errors;
use crate::utils::swapi::EnrichedCharacter;
use crate::utils::swc_utils::{timestamp_utc, timestamp_utc_secs_to_str};

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Name under which the page template is registered with tera.
const PAGE_TEMPLATE_NAME : &str = "index.html";

// ***************************************************************************
//                                Page Model
// ***************************************************************************
// ---------------------------------------------------------------------------
// PageModel:
// ---------------------------------------------------------------------------
/// The fully assembled data handed to the rendering step.  Constructed once
/// per request and never mutated afterwards.  The page_error field carries a
/// note when the character-list fetch itself failed and the page renders
/// with zero rows.
#[derive(Debug, Serialize)]
pub struct PageModel {
    pub page_title: String,
    pub generated_at: String,
    pub page_error: Option<String>,
    pub characters: Vec<EnrichedCharacter>,
}

impl PageModel {
    pub fn new(page_title: String,
               characters: Vec<EnrichedCharacter>,
               page_error: Option<String>) -> Self {
        PageModel {
            page_title,
            generated_at: timestamp_utc_secs_to_str(timestamp_utc()),
            page_error,
            characters,
        }
    }
}

// ***************************************************************************
//                             Public Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// render_page:
// ---------------------------------------------------------------------------
/** Load the page template from the file system and render the model through
 * it.  The template is read on every request; nothing is cached between
 * requests.  Load and render failures are distinct error variants, logged
 * here before returning.
 */
pub fn render_page(template_path: &str, model: &PageModel) -> Result<String, Errors> {
    let source = match fs::read_to_string(template_path) {
        Ok(s) => s,
        Err(e) => {
            let err = Errors::TemplateLoadError(template_path.to_string(), e.to_string());
            error!("{}", err);
            return Err(err);
        },
    };

    render_page_source(&source, model)
}

// ---------------------------------------------------------------------------
// render_page_source:
// ---------------------------------------------------------------------------
/** Compile the template source and render the serialized model through it. */
pub fn render_page_source(source: &str, model: &PageModel) -> Result<String, Errors> {
    let mut tera = Tera::default();
    if let Err(e) = tera.add_raw_template(PAGE_TEMPLATE_NAME, source) {
        let err = Errors::TemplateRenderError(PAGE_TEMPLATE_NAME.to_string(), e.to_string());
        error!("{}", err);
        return Err(err);
    }

    let context = match Context::from_serialize(model) {
        Ok(c) => c,
        Err(e) => {
            let err = Errors::TemplateRenderError(PAGE_TEMPLATE_NAME.to_string(), e.to_string());
            error!("{}", err);
            return Err(err);
        },
    };

    match tera.render(PAGE_TEMPLATE_NAME, &context) {
        Ok(html) => Ok(html),
        Err(e) => {
            let err = Errors::TemplateRenderError(PAGE_TEMPLATE_NAME.to_string(), e.to_string());
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
    use crate::utils::swapi::PlanetRecord;

    // The template shipped at the repository root.
    const PAGE_TEMPLATE : &str = include_str!("../../index.html");

    fn enriched(name: &str, planet: Option<PlanetRecord>, fetch_error: Option<String>) -> EnrichedCharacter {
        EnrichedCharacter {
            name: name.to_string(),
            home_world_url: "http://x/planets/1/".to_string(),
            home_world: planet,
            fetch_error,
        }
    }

    #[test]
    fn render_populated_page() {
        let planet = PlanetRecord {
            name: "Tatooine".to_string(),
            population: "200000".to_string(),
            terrain: "desert".to_string(),
        };
        let model = PageModel::new(
            "Star Wars Characters".to_string(),
            vec![enriched("Luke Skywalker", Some(planet), None)],
            None,
        );

        let html = render_page_source(PAGE_TEMPLATE, &model).unwrap();
        assert!(html.contains("Star Wars Characters"));
        assert!(html.contains("Luke Skywalker"));
        assert!(html.contains("Tatooine"));
        assert!(html.contains("desert"));
    }

    #[test]
    fn render_empty_page() {
        let model = PageModel::new("Star Wars Characters".to_string(), vec![], None);
        let html = render_page_source(PAGE_TEMPLATE, &model).unwrap();
        assert!(html.contains("Star Wars Characters"));
    }

    #[test]
    fn render_failed_enrichment_placeholder() {
        let model = PageModel::new(
            "Star Wars Characters".to_string(),
            vec![enriched("Luke Skywalker", None, Some("Request to http://x failed".to_string()))],
            None,
        );
        let html = render_page_source(PAGE_TEMPLATE, &model).unwrap();
        assert!(html.contains("Luke Skywalker"));
        assert!(html.contains("unavailable"));
    }

    #[test]
    fn render_page_error_note() {
        let model = PageModel::new(
            "Star Wars Characters".to_string(),
            vec![],
            Some("Request to http://x/people failed".to_string()),
        );
        let html = render_page_source(PAGE_TEMPLATE, &model).unwrap();
        assert!(html.contains("Request to http://x/people failed"));
    }

    #[test]
    fn render_missing_template_file() {
        let model = PageModel::new("t".to_string(), vec![], None);
        let result = render_page("/nonexistent/path/index.html", &model);
        assert!(matches!(result, Err(Errors::TemplateLoadError(_, _))));
    }

    #[test]
    fn render_malformed_template() {
        let model = PageModel::new("t".to_string(), vec![], None);
        let result = render_page_source("{% for c in", &model);
        assert!(matches!(result, Err(Errors::TemplateRenderError(_, _))));
    }
}
