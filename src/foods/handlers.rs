use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use super::dto::{Product, SearchFoodQuery};
use crate::{
    errors::{api_error, bad_request, ApiError},
    state::AppState,
};

pub fn food_routes() -> Router<AppState> {
    Router::new().route("/search_food", get(search_food))
}

/// Barcodes are interpolated into the upstream URL path, so only digits pass.
pub(crate) fn is_valid_barcode(barcode: &str) -> bool {
    lazy_static! {
        static ref BARCODE_RE: Regex = Regex::new(r"^[0-9]+$").unwrap();
    }
    BARCODE_RE.is_match(barcode)
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// GET /api/search_food?query=...&barcode=...
#[instrument(skip(state))]
pub async fn search_food(
    State(state): State<AppState>,
    Query(q): Query<SearchFoodQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let barcode = non_blank(q.barcode);
    let query = non_blank(q.query);
    let had_barcode = barcode.is_some();

    let barcode = barcode.filter(|b| {
        let usable = is_valid_barcode(b);
        if !usable {
            warn!(barcode = %b, "ignoring non-numeric barcode");
        }
        usable
    });

    let result = match (barcode, query) {
        (Some(barcode), _) => state
            .foods
            .lookup_by_barcode(&barcode)
            .await
            .map(|found| found.into_iter().collect::<Vec<_>>()),
        (None, Some(query)) => {
            let cfg = &state.config.food_db;
            state
                .foods
                .search_by_name(&query, cfg.search_page_size, &cfg.search_lang)
                .await
        }
        (None, None) if had_barcode => {
            info!("barcode cannot match any product");
            Ok(Vec::new())
        }
        (None, None) => {
            return Err(bad_request("Provide a search query or a barcode"));
        }
    };

    match result {
        Ok(products) => {
            info!(count = products.len(), "search_food ok");
            Ok(Json(products))
        }
        Err(e) => {
            error!(error = %e, "food database lookup failed");
            Err(api_error(
                e.status_code(),
                "Error communicating with the external food database",
            ))
        }
    }
}
