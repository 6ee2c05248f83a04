//! Catalog queries: a typed filter compiled to SQL, plus the facet block
//! (brands, tag frequencies, price range) returned alongside product pages.
//!
//! No caching layer; every call re-queries.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::Product;

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 100;
/// Facet block keeps only the most frequent tags.
pub const TOP_TAG_COUNT: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    PriceAsc,
    PriceDesc,
    Rating,
    Newest,
    Popularity,
    /// Default: rating, then review count, then recency.
    #[default]
    Relevance,
}

impl SortKey {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("price_asc") => Self::PriceAsc,
            Some("price_desc") => Self::PriceDesc,
            Some("rating") => Self::Rating,
            Some("newest") => Self::Newest,
            Some("popularity") => Self::Popularity,
            _ => Self::Relevance,
        }
    }

    fn order_clause(self) -> &'static str {
        match self {
            Self::PriceAsc => "price ASC",
            Self::PriceDesc => "price DESC",
            Self::Rating => "rating DESC",
            Self::Newest => "created_at DESC",
            Self::Popularity => "review_count DESC, rating DESC",
            Self::Relevance => "rating DESC, review_count DESC, created_at DESC",
        }
    }
}

/// Raw query-string parameters for product listing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogParams {
    pub category: Option<String>,
    pub search: Option<String>,
    /// Comma-separated brand allow-list.
    pub brands: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_rating: Option<f64>,
    pub in_stock: Option<bool>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub exclude: Option<Uuid>,
}

/// Structured filter with named, typed fields; compiled to SQL by the
/// methods below rather than assembled ad hoc in handlers.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub brands: Vec<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_rating: Option<f64>,
    pub in_stock: bool,
    pub sort: SortKey,
    pub page: u32,
    pub limit: u32,
    pub exclude: Option<Uuid>,
}

impl From<CatalogParams> for CatalogFilter {
    fn from(p: CatalogParams) -> Self {
        Self {
            category: p.category.filter(|c| !c.trim().is_empty()),
            search: p.search.filter(|s| !s.trim().is_empty()),
            brands: p
                .brands
                .map(|b| {
                    b.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            min_price: p.min_price,
            max_price: p.max_price,
            min_rating: p.min_rating,
            in_stock: p.in_stock.unwrap_or(false),
            sort: SortKey::parse(p.sort.as_deref()),
            page: p.page.unwrap_or(1).max(1),
            limit: p.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            exclude: p.exclude,
        }
    }
}

impl CatalogFilter {
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE status = 'ACTIVE'");
        if let Some(category) = &self.category {
            qb.push(" AND LOWER(category) = LOWER(");
            qb.push_bind(category.clone());
            qb.push(")");
        }
        if let Some(search) = &self.search {
            let pattern = format!("%{}%", search.trim());
            qb.push(" AND (title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR description ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR brand ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR array_to_string(tags, ' ') ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
        if !self.brands.is_empty() {
            qb.push(" AND brand = ANY(");
            qb.push_bind(self.brands.clone());
            qb.push(")");
        }
        if let Some(min) = self.min_price {
            qb.push(" AND price >= ");
            qb.push_bind(min);
        }
        if let Some(max) = self.max_price {
            qb.push(" AND price <= ");
            qb.push_bind(max);
        }
        if let Some(rating) = self.min_rating {
            qb.push(" AND rating >= ");
            qb.push_bind(rating);
        }
        if self.in_stock {
            qb.push(" AND inventory > 0");
        }
        if let Some(exclude) = self.exclude {
            qb.push(" AND id <> ");
            qb.push_bind(exclude);
        }
    }

    fn count_query(&self) -> QueryBuilder<'_, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM products");
        self.push_conditions(&mut qb);
        qb
    }

    fn page_query(&self) -> QueryBuilder<'_, Postgres> {
        let mut qb = QueryBuilder::new("SELECT * FROM products");
        self.push_conditions(&mut qb);
        qb.push(" ORDER BY ");
        qb.push(self.sort.order_clause());
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(self.limit));
        qb.push(" OFFSET ");
        qb.push_bind(self.offset());
        qb
    }
}

/// One filtered page plus the total row count.
pub async fn run(db: &PgPool, filter: &CatalogFilter) -> anyhow::Result<(Vec<Product>, i64)> {
    let mut count = filter.count_query();
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(db)
        .await
        .context("count products")?;
    let mut page = filter.page_query();
    let products = page
        .build_query_as::<Product>()
        .fetch_all(db)
        .await
        .context("fetch product page")?;
    Ok((products, total))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRange {
    pub min: i64,
    pub max: i64,
}

/// Facet summaries over the (optionally category-scoped) active catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub brands: Vec<String>,
    pub tags: Vec<TagCount>,
    pub price_range: PriceRange,
}

pub async fn filter_options(db: &PgPool, category: Option<&str>) -> anyhow::Result<FilterOptions> {
    let mut qb = QueryBuilder::new(
        "SELECT DISTINCT brand FROM products WHERE status = 'ACTIVE' AND brand IS NOT NULL",
    );
    push_category(&mut qb, category);
    qb.push(" ORDER BY brand");
    let brands: Vec<String> = qb
        .build_query_scalar()
        .fetch_all(db)
        .await
        .context("fetch brand facet")?;

    let mut qb = QueryBuilder::new(
        "SELECT t.tag, COUNT(*) FROM products p, unnest(p.tags) AS t(tag) \
         WHERE p.status = 'ACTIVE'",
    );
    push_category_qualified(&mut qb, category);
    qb.push(" GROUP BY t.tag ORDER BY COUNT(*) DESC, t.tag LIMIT ");
    qb.push_bind(TOP_TAG_COUNT);
    let tags: Vec<(String, i64)> = qb
        .build_query_as()
        .fetch_all(db)
        .await
        .context("fetch tag facet")?;

    let mut qb = QueryBuilder::new(
        "SELECT COALESCE(MIN(price), 0), COALESCE(MAX(price), 0) FROM products \
         WHERE status = 'ACTIVE'",
    );
    push_category(&mut qb, category);
    let (min, max): (i64, i64) = qb
        .build_query_as()
        .fetch_one(db)
        .await
        .context("fetch price range facet")?;

    Ok(FilterOptions {
        brands,
        tags: tags
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect(),
        price_range: PriceRange { min, max },
    })
}

fn push_category(qb: &mut QueryBuilder<'_, Postgres>, category: Option<&str>) {
    if let Some(category) = category {
        qb.push(" AND LOWER(category) = LOWER(");
        qb.push_bind(category.to_string());
        qb.push(")");
    }
}

fn push_category_qualified(qb: &mut QueryBuilder<'_, Postgres>, category: Option<&str>) {
    if let Some(category) = category {
        qb.push(" AND LOWER(p.category) = LOWER(");
        qb.push_bind(category.to_string());
        qb.push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_filter() -> CatalogFilter {
        CatalogFilter::from(CatalogParams {
            category: Some("Electronics".into()),
            search: Some("phone".into()),
            brands: Some("acme, globex".into()),
            min_price: Some(0),
            max_price: Some(999_999),
            min_rating: Some(3.5),
            in_stock: Some(true),
            sort: Some("price_asc".into()),
            page: Some(2),
            limit: Some(24),
            exclude: Some(Uuid::nil()),
        })
    }

    #[test]
    fn test_params_normalization() {
        let f = full_filter();
        assert_eq!(f.brands, vec!["acme".to_string(), "globex".to_string()]);
        assert_eq!(f.sort, SortKey::PriceAsc);
        assert_eq!(f.offset(), 24);

        let d = CatalogFilter::from(CatalogParams::default());
        assert_eq!(d.page, 1);
        assert_eq!(d.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(d.sort, SortKey::Relevance);
        assert!(d.brands.is_empty());
    }

    #[test]
    fn test_limit_clamped() {
        let f = CatalogFilter::from(CatalogParams {
            limit: Some(5000),
            page: Some(0),
            ..Default::default()
        });
        assert_eq!(f.limit, MAX_PAGE_SIZE);
        assert_eq!(f.page, 1);
    }

    #[test]
    fn test_page_query_sql() {
        let sql = full_filter().page_query().into_sql();
        assert!(sql.starts_with("SELECT * FROM products WHERE status = 'ACTIVE'"));
        assert!(sql.contains("LOWER(category) = LOWER($1)"));
        assert!(sql.contains("title ILIKE $2"));
        assert!(sql.contains("array_to_string(tags, ' ') ILIKE $5"));
        assert!(sql.contains("brand = ANY($6)"));
        assert!(sql.contains("price >= $7"));
        assert!(sql.contains("price <= $8"));
        assert!(sql.contains("rating >= $9"));
        assert!(sql.contains("inventory > 0"));
        assert!(sql.contains("id <> $10"));
        assert!(sql.contains("ORDER BY price ASC"));
        assert!(sql.ends_with("LIMIT $11 OFFSET $12"));
    }

    #[test]
    fn test_count_query_has_no_ordering() {
        let sql = full_filter().count_query().into_sql();
        assert!(sql.starts_with("SELECT COUNT(*) FROM products"));
        assert!(!sql.contains("ORDER BY"));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn test_empty_filter_only_gates_on_status() {
        let sql = CatalogFilter::from(CatalogParams::default())
            .count_query()
            .into_sql();
        assert_eq!(sql, "SELECT COUNT(*) FROM products WHERE status = 'ACTIVE'");
    }
}
