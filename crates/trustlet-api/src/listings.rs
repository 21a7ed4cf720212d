use std::str::FromStr;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use trustlet_db::{ListingRow, NewListing, SearchFilters};
use trustlet_types::Neighborhood;
use trustlet_types::api::{CreateListingRequest, ListingResponse, ListingSearchQuery, SetActiveRequest};

use crate::auth::AppState;
use crate::error::AppError;
use crate::middleware::Session;

pub async fn create_listing(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateListingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let new = NewListing {
        owner_id: session.user_id,
        title: req.title,
        home_type: req.home_type,
        bedrooms: req.bedrooms,
        neighborhood: req.neighborhood,
        street_name: req.street_name,
        cost: req.cost,
        start_date: req.start_date,
        end_date: req.end_date,
        photo_link: req.photo_link,
    }
    .validated()
    .map_err(|e| AppError::validation(e.to_string()))?;

    let listing = state
        .workflow
        .run_store(move |db| Ok(db.create_listing(new)?))
        .await?;
    info!("{} listed '{}' in {}", session.email, listing.title, listing.neighborhood);

    Ok((
        StatusCode::CREATED,
        Json(ListingResponse {
            per_night_cost: listing.per_night_cost(),
            listing,
            owner_name: Some(session.name),
            member_since: None,
        }),
    ))
}

pub async fn search_listings(
    State(state): State<AppState>,
    Query(query): Query<ListingSearchQuery>,
) -> Result<Json<Vec<ListingResponse>>, AppError> {
    let filters = search_filters(query)?;
    let rows = state
        .workflow
        .run_store(move |db| Ok(db.search_listings(&filters)?))
        .await?;

    Ok(Json(rows.into_iter().map(listing_response).collect()))
}

pub async fn my_listings(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<ListingResponse>>, AppError> {
    let owner_id = session.user_id;
    let listings = state
        .workflow
        .run_store(move |db| Ok(db.listings_for_owner(owner_id)?))
        .await?;

    Ok(Json(
        listings
            .into_iter()
            .map(|listing| ListingResponse {
                per_night_cost: listing.per_night_cost(),
                listing,
                owner_name: Some(session.name.clone()),
                member_since: None,
            })
            .collect(),
    ))
}

/// Owners deactivate a listing to take it off the browse page without
/// deleting it, and can reactivate it later.
pub async fn set_listing_active(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
    Extension(session): Extension<Session>,
    Json(req): Json<SetActiveRequest>,
) -> Result<StatusCode, AppError> {
    let owner_id = session.user_id;
    state
        .workflow
        .run_store(move |db| {
            let listing = db
                .get_listing(listing_id)?
                .ok_or(AppError::NotFound("listing"))?;
            if listing.owner_id != owner_id {
                return Err(AppError::Forbidden);
            }
            db.set_listing_active(listing_id, req.active)?;
            Ok(())
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn search_filters(query: ListingSearchQuery) -> Result<SearchFilters, AppError> {
    let neighborhoods = query
        .neighborhood
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|n| Neighborhood::from_str(n).map_err(|e| AppError::validation(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    if query.max_cost.is_some_and(|c| !c.is_finite() || c < 0.0) {
        return Err(AppError::validation("max_cost must be a non-negative amount."));
    }

    Ok(SearchFilters {
        neighborhoods,
        home_type: query.home_type,
        max_cost: query.max_cost,
        desired_start: query.start,
        desired_end: query.end,
    })
}

fn listing_response(row: ListingRow) -> ListingResponse {
    ListingResponse {
        per_night_cost: row.listing.per_night_cost(),
        listing: row.listing,
        owner_name: row.owner_name,
        member_since: row.owner_created_at.map(|t| t.format("%b %Y").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighborhood_list_is_comma_separated() {
        let filters = search_filters(ListingSearchQuery {
            neighborhood: Some("Oost, Oud-West,".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            filters.neighborhoods,
            vec![Neighborhood::Oost, Neighborhood::OudWest]
        );
    }

    #[test]
    fn unknown_neighborhood_is_rejected() {
        let err = search_filters(ListingSearchQuery {
            neighborhood: Some("Atlantis".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn no_filters_means_everything() {
        let filters = search_filters(ListingSearchQuery::default()).unwrap();
        assert!(filters.neighborhoods.is_empty());
        assert!(filters.max_cost.is_none());
    }
}
