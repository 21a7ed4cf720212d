use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use trustlet_types::{HomeType, Listing, Neighborhood};

use crate::Database;
use crate::models::{ListingRow, NewListing, parsed};

pub const DEFAULT_LISTING_TITLE: &str = "Untitled listing";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ListingValidationError {
    #[error("cost must be a non-negative amount, got {0}")]
    InvalidCost(f64),
    #[error("a listing needs at least one bedroom")]
    NoBedrooms,
}

impl NewListing {
    /// Apply the listing defaults and reject values the store cannot hold.
    /// An end date before the start date is accepted as entered.
    pub fn validated(mut self) -> Result<Self, ListingValidationError> {
        let title = self.title.trim();
        self.title = if title.is_empty() {
            DEFAULT_LISTING_TITLE.to_string()
        } else {
            title.to_string()
        };
        self.street_name = self.street_name.trim().to_string();
        self.photo_link = self
            .photo_link
            .map(|link| link.trim().to_string())
            .filter(|link| !link.is_empty());

        if !self.cost.is_finite() || self.cost < 0.0 {
            return Err(ListingValidationError::InvalidCost(self.cost));
        }
        if self.bedrooms < 1 {
            return Err(ListingValidationError::NoBedrooms);
        }
        Ok(self)
    }
}

/// Browse filters. Every field is optional and they combine with AND.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Empty means any neighborhood.
    pub neighborhoods: Vec<Neighborhood>,
    pub home_type: Option<HomeType>,
    pub max_cost: Option<f64>,
    pub desired_start: Option<NaiveDate>,
    pub desired_end: Option<NaiveDate>,
}

impl SearchFilters {
    /// WHERE clause and its positional parameters. Date bounds select
    /// listings whose availability overlaps the desired window.
    fn to_sql(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut clauses = vec!["l.is_active = 1".to_string()];
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if !self.neighborhoods.is_empty() {
            let start = params.len() + 1;
            let placeholders: Vec<String> = (start..start + self.neighborhoods.len())
                .map(|i| format!("?{}", i))
                .collect();
            clauses.push(format!("l.location IN ({})", placeholders.join(", ")));
            for n in &self.neighborhoods {
                params.push(Box::new(n.as_str()));
            }
        }
        if let Some(home_type) = self.home_type {
            params.push(Box::new(home_type.as_str()));
            clauses.push(format!("l.home_type = ?{}", params.len()));
        }
        if let Some(max_cost) = self.max_cost {
            params.push(Box::new(max_cost));
            clauses.push(format!("l.cost <= ?{}", params.len()));
        }
        if let Some(end) = self.desired_end {
            params.push(Box::new(end));
            clauses.push(format!("l.start_date <= ?{}", params.len()));
        }
        if let Some(start) = self.desired_start {
            params.push(Box::new(start));
            clauses.push(format!("l.end_date >= ?{}", params.len()));
        }

        (clauses.join(" AND "), params)
    }
}

const LISTING_COLUMNS: &str = "l.id, l.user_id, l.title, l.home_type, l.bedrooms, l.location, \
     l.street_name, l.cost, l.start_date, l.end_date, l.photo_link, l.is_active, l.created_at";

impl Database {
    // -- Listings --

    pub fn create_listing(&self, new: NewListing) -> Result<Listing> {
        let new = new.validated()?;
        let listing = Listing {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            title: new.title,
            home_type: new.home_type,
            bedrooms: new.bedrooms,
            neighborhood: new.neighborhood,
            street_name: new.street_name,
            cost: new.cost,
            start_date: new.start_date,
            end_date: new.end_date,
            photo_link: new.photo_link,
            is_active: true,
            created_at: Utc::now(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO listings (id, user_id, title, home_type, bedrooms, location, street_name,
                                       cost, start_date, end_date, photo_link, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                rusqlite::params![
                    listing.id.to_string(),
                    listing.owner_id.to_string(),
                    &listing.title,
                    listing.home_type.as_str(),
                    listing.bedrooms,
                    listing.neighborhood.as_str(),
                    &listing.street_name,
                    listing.cost,
                    listing.start_date,
                    listing.end_date,
                    &listing.photo_link,
                    listing.is_active,
                    listing.created_at,
                ],
            )?;
            Ok(())
        })?;

        Ok(listing)
    }

    /// Active listings matching `filters`, latest start date first.
    pub fn search_listings(&self, filters: &SearchFilters) -> Result<Vec<ListingRow>> {
        let (predicate, params) = filters.to_sql();
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {LISTING_COLUMNS}, u.name, u.created_at
                 FROM listings l
                 LEFT JOIN users u ON l.user_id = u.id
                 WHERE {predicate}
                 ORDER BY l.start_date DESC, l.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

            let rows = stmt
                .query_map(param_refs.as_slice(), |row| {
                    Ok(ListingRow {
                        listing: map_listing(row)?,
                        owner_name: row.get(13)?,
                        owner_created_at: row.get(14)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_listing(&self, id: Uuid) -> Result<Option<Listing>> {
        self.with_conn(|conn| query_listing(conn, id))
    }

    /// All of an owner's listings, active or not, newest first.
    pub fn listings_for_owner(&self, owner_id: Uuid) -> Result<Vec<Listing>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {LISTING_COLUMNS} FROM listings l
                 WHERE l.user_id = ?1
                 ORDER BY l.created_at DESC, l.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id.to_string()], map_listing)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false when the listing does not exist.
    pub fn set_listing_active(&self, id: Uuid, active: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE listings SET is_active = ?1 WHERE id = ?2",
                rusqlite::params![active, id.to_string()],
            )?;
            Ok(n > 0)
        })
    }
}

fn query_listing(conn: &Connection, id: Uuid) -> Result<Option<Listing>> {
    let sql = format!("SELECT {LISTING_COLUMNS} FROM listings l WHERE l.id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id.to_string()], map_listing).optional()?;
    Ok(row)
}

fn map_listing(row: &Row<'_>) -> rusqlite::Result<Listing> {
    Ok(Listing {
        id: parsed(row, 0)?,
        owner_id: parsed(row, 1)?,
        title: row.get(2)?,
        home_type: parsed(row, 3)?,
        bedrooms: row.get(4)?,
        neighborhood: parsed(row, 5)?,
        street_name: row.get(6)?,
        cost: row.get(7)?,
        start_date: row.get(8)?,
        end_date: row.get(9)?,
        photo_link: row.get(10)?,
        is_active: row.get(11)?,
        created_at: row.get(12)?,
    })
}
