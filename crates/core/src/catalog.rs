//! Product records and the catalog filter/sort/search pipeline.
//!
//! The storefront fetches the whole catalog and derives the displayed list in
//! memory: category, then the selected filter keyword, then the free-text
//! search term.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId};

/// A catalog product as stored on the data endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Formatted price string, e.g. `"$24.99"`.
    pub price: String,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub best_selling: bool,
    #[serde(default)]
    pub new_arrival: bool,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(flatten)]
    pub care: CareProfile,
}

impl Product {
    /// Parsed numeric price; unparseable prices count as zero.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        Price::parse_or_zero(&self.price)
    }

    /// Whether any stock is left.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    fn matches_term(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

/// Horticultural attributes shown on the product page.
///
/// Every field is optional because catalog records are edited by hand in the
/// admin console and older records predate most of these attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CareProfile {
    pub botanical_name: Option<String>,
    pub sunlight: Option<String>,
    pub watering: Option<String>,
    pub humidity: Option<String>,
    pub temperature: Option<String>,
    pub soil: Option<String>,
    pub fertilizer: Option<String>,
    pub growth_rate: Option<String>,
    pub mature_size: Option<String>,
    pub pot_size: Option<String>,
    pub bloom_season: Option<String>,
    pub flower_color: Option<String>,
    pub foliage_color: Option<String>,
    pub care_level: Option<String>,
    pub pet_friendly: Option<bool>,
    pub air_purifying: Option<bool>,
    pub origin: Option<String>,
    pub hardiness_zone: Option<String>,
    pub propagation: Option<String>,
    pub pruning: Option<String>,
    pub repotting: Option<String>,
}

impl CareProfile {
    /// Label/value pairs for every attribute that is set, in display order.
    #[must_use]
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        let yes_no = |flag: bool| if flag { "Yes" } else { "No" }.to_owned();
        let text = [
            ("Botanical name", &self.botanical_name),
            ("Sunlight", &self.sunlight),
            ("Watering", &self.watering),
            ("Humidity", &self.humidity),
            ("Temperature", &self.temperature),
            ("Soil", &self.soil),
            ("Fertilizer", &self.fertilizer),
            ("Growth rate", &self.growth_rate),
            ("Mature size", &self.mature_size),
            ("Pot size", &self.pot_size),
            ("Bloom season", &self.bloom_season),
            ("Flower color", &self.flower_color),
            ("Foliage color", &self.foliage_color),
            ("Care level", &self.care_level),
            ("Origin", &self.origin),
            ("Hardiness zone", &self.hardiness_zone),
            ("Propagation", &self.propagation),
            ("Pruning", &self.pruning),
            ("Repotting", &self.repotting),
        ];

        let mut out: Vec<(&'static str, String)> = text
            .into_iter()
            .filter_map(|(label, value)| {
                value
                    .as_deref()
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (label, v.to_owned()))
            })
            .collect();
        if let Some(flag) = self.pet_friendly {
            out.push(("Pet friendly", yes_no(flag)));
        }
        if let Some(flag) = self.air_purifying {
            out.push(("Air purifying", yes_no(flag)));
        }
        out
    }
}

/// Payload for creating or replacing a product (everything but the id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub best_selling: bool,
    #[serde(default)]
    pub new_arrival: bool,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(flatten)]
    pub care: CareProfile,
}

impl NewProduct {
    /// Attach an id, producing the full record.
    #[must_use]
    pub fn with_id(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            description: self.description,
            price: self.price,
            stock: self.stock,
            category: self.category,
            image: self.image,
            best_selling: self.best_selling,
            new_arrival: self.new_arrival,
            rating: self.rating,
            care: self.care,
        }
    }
}

impl From<Product> for NewProduct {
    fn from(product: Product) -> Self {
        Self {
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            category: product.category,
            image: product.image,
            best_selling: product.best_selling,
            new_arrival: product.new_arrival,
            rating: product.rating,
            care: product.care,
        }
    }
}

/// Mutually exclusive listing filters, selected by keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogFilter {
    All,
    BestSelling,
    NewArrivals,
    InStock,
    PetFriendly,
    PriceLowHigh,
    PriceHighLow,
    NameAz,
    NameZa,
    TopRated,
}

impl CatalogFilter {
    /// Every filter, in the order the listing sidebar shows them.
    pub const ALL: [Self; 10] = [
        Self::All,
        Self::BestSelling,
        Self::NewArrivals,
        Self::InStock,
        Self::PetFriendly,
        Self::PriceLowHigh,
        Self::PriceHighLow,
        Self::NameAz,
        Self::NameZa,
        Self::TopRated,
    ];

    /// Parse a filter keyword. Unknown keywords yield `None`.
    #[must_use]
    pub fn parse(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.keyword() == keyword)
    }

    /// The keyword used in URLs (`?filter=priceLowHigh`).
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::BestSelling => "bestSelling",
            Self::NewArrivals => "newArrivals",
            Self::InStock => "inStock",
            Self::PetFriendly => "petFriendly",
            Self::PriceLowHigh => "priceLowHigh",
            Self::PriceHighLow => "priceHighLow",
            Self::NameAz => "nameAZ",
            Self::NameZa => "nameZA",
            Self::TopRated => "topRated",
        }
    }

    /// Sidebar label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "All plants",
            Self::BestSelling => "Best sellers",
            Self::NewArrivals => "New arrivals",
            Self::InStock => "In stock",
            Self::PetFriendly => "Pet friendly",
            Self::PriceLowHigh => "Price: low to high",
            Self::PriceHighLow => "Price: high to low",
            Self::NameAz => "Name: A to Z",
            Self::NameZa => "Name: Z to A",
            Self::TopRated => "Top rated",
        }
    }

    /// Apply this filter to a product list.
    #[must_use]
    pub fn apply(self, mut products: Vec<Product>) -> Vec<Product> {
        match self {
            Self::All => {}
            Self::BestSelling => products.retain(|p| p.best_selling),
            Self::NewArrivals => products.retain(|p| p.new_arrival),
            Self::InStock => products.retain(Product::in_stock),
            Self::PetFriendly => products.retain(|p| p.care.pet_friendly == Some(true)),
            Self::PriceLowHigh => products.sort_by_key(Product::unit_price),
            Self::PriceHighLow => {
                products.sort_by_key(|p| std::cmp::Reverse(p.unit_price()));
            }
            Self::NameAz => products.sort_by_cached_key(|p| p.name.to_lowercase()),
            Self::NameZa => {
                products.sort_by_cached_key(|p| std::cmp::Reverse(p.name.to_lowercase()));
            }
            Self::TopRated => products.sort_by(|a, b| {
                b.rating
                    .unwrap_or(0.0)
                    .total_cmp(&a.rating.unwrap_or(0.0))
            }),
        }
        products
    }
}

/// Apply an optional filter; `None` (an unrecognized keyword) is a no-op.
#[must_use]
pub fn apply_filter(products: Vec<Product>, filter: Option<CatalogFilter>) -> Vec<Product> {
    match filter {
        Some(filter) => filter.apply(products),
        None => products,
    }
}

/// Case-insensitive substring search over name and description.
///
/// An empty or whitespace-only term matches everything.
#[must_use]
pub fn search(mut products: Vec<Product>, term: &str) -> Vec<Product> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return products;
    }
    products.retain(|p| p.matches_term(&needle));
    products
}

/// The listing query as read from the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Raw filter keyword; unknown keywords leave the list unchanged.
    pub filter: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
}

impl CatalogQuery {
    /// The parsed filter, if the keyword is recognized.
    #[must_use]
    pub fn parsed_filter(&self) -> Option<CatalogFilter> {
        self.filter.as_deref().and_then(CatalogFilter::parse)
    }

    /// Run category, filter and search over the full catalog.
    #[must_use]
    pub fn run(&self, mut products: Vec<Product>) -> Vec<Product> {
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            products.retain(|p| p.category.eq_ignore_ascii_case(category));
        }
        let products = apply_filter(products, self.parsed_filter());
        match self.search.as_deref() {
            Some(term) => search(products, term),
            None => products,
        }
    }
}

/// Sorted distinct, non-empty category names.
#[must_use]
pub fn categories(products: &[Product]) -> Vec<String> {
    products
        .iter()
        .map(|p| p.category.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Up to `limit` other products from the same category.
#[must_use]
pub fn related<'a>(products: &'a [Product], product: &Product, limit: usize) -> Vec<&'a Product> {
    products
        .iter()
        .filter(|p| p.id != product.id && p.category.eq_ignore_ascii_case(&product.category))
        .take(limit)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use super::*;

    pub fn product(id: &str, name: &str, price: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_owned(),
            description: String::new(),
            price: price.to_owned(),
            stock: 10,
            category: "Indoor".to_owned(),
            image: String::new(),
            best_selling: false,
            new_arrival: false,
            rating: None,
            care: CareProfile::default(),
        }
    }

    fn names(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_price_low_high() {
        let products = vec![
            product("1", "Fifty", "50"),
            product("2", "Ten", "10"),
            product("3", "Thirty", "30"),
        ];
        let sorted = apply_filter(products, CatalogFilter::parse("priceLowHigh"));
        assert_eq!(names(&sorted), ["Ten", "Thirty", "Fifty"]);
    }

    #[test]
    fn test_price_high_low_parses_formatted_prices() {
        let products = vec![
            product("1", "A", "$9.99"),
            product("2", "B", "$1,200"),
            product("3", "C", "$45.50"),
        ];
        let sorted = CatalogFilter::PriceHighLow.apply(products);
        assert_eq!(names(&sorted), ["B", "C", "A"]);
    }

    #[test]
    fn test_unparseable_price_sorts_as_zero() {
        let products = vec![product("1", "Priced", "5"), product("2", "Odd", "ask")];
        let sorted = CatalogFilter::PriceLowHigh.apply(products);
        assert_eq!(names(&sorted), ["Odd", "Priced"]);
    }

    #[test]
    fn test_unrecognized_filter_is_noop() {
        let products = vec![product("1", "Z", "3"), product("2", "A", "1")];
        let query = CatalogQuery {
            filter: Some("mostMysterious".to_owned()),
            ..CatalogQuery::default()
        };
        assert_eq!(names(&query.run(products)), ["Z", "A"]);
    }

    #[test]
    fn test_flag_filters() {
        let mut best = product("1", "Best", "3");
        best.best_selling = true;
        let mut fresh = product("2", "Fresh", "3");
        fresh.new_arrival = true;
        fresh.care.pet_friendly = Some(true);
        let mut empty = product("3", "Gone", "3");
        empty.stock = 0;
        let all = vec![best, fresh, empty];

        assert_eq!(names(&CatalogFilter::BestSelling.apply(all.clone())), ["Best"]);
        assert_eq!(names(&CatalogFilter::NewArrivals.apply(all.clone())), ["Fresh"]);
        assert_eq!(names(&CatalogFilter::PetFriendly.apply(all.clone())), ["Fresh"]);
        assert_eq!(
            names(&CatalogFilter::InStock.apply(all.clone())),
            ["Best", "Fresh"]
        );
        assert_eq!(CatalogFilter::All.apply(all).len(), 3);
    }

    #[test]
    fn test_name_and_rating_sorts() {
        let mut a = product("1", "aloe", "1");
        a.rating = Some(4.2);
        let mut b = product("2", "Begonia", "1");
        b.rating = Some(4.9);
        let c = product("3", "Cactus", "1");
        let all = vec![c, a, b];

        assert_eq!(
            names(&CatalogFilter::NameAz.apply(all.clone())),
            ["aloe", "Begonia", "Cactus"]
        );
        assert_eq!(
            names(&CatalogFilter::NameZa.apply(all.clone())),
            ["Cactus", "Begonia", "aloe"]
        );
        assert_eq!(
            names(&CatalogFilter::TopRated.apply(all)),
            ["Begonia", "aloe", "Cactus"]
        );
    }

    #[test]
    fn test_search_name_and_description_case_insensitive() {
        let bush = product("1", "Rose Bush", "20");
        let mut climber = product("2", "Climbing Vine", "15");
        climber.description = "Pairs well with a ROSE arch".to_owned();
        let fern = product("3", "Boston Fern", "12");

        let found = search(vec![bush, climber, fern], "rose");
        assert_eq!(names(&found), ["Rose Bush", "Climbing Vine"]);
    }

    #[test]
    fn test_blank_search_matches_all() {
        let all = vec![product("1", "A", "1"), product("2", "B", "1")];
        assert_eq!(search(all, "   ").len(), 2);
    }

    #[test]
    fn test_search_applies_after_filter() {
        let mut cheap_rose = product("1", "Rose Mini", "5");
        cheap_rose.best_selling = true;
        let pricey_rose = product("2", "Rose Grand", "50");
        let query = CatalogQuery {
            filter: Some("bestSelling".to_owned()),
            search: Some("rose".to_owned()),
            category: None,
        };
        assert_eq!(names(&query.run(vec![cheap_rose, pricey_rose])), ["Rose Mini"]);
    }

    #[test]
    fn test_category_and_related() {
        let mut outdoor = product("1", "Maple", "80");
        outdoor.category = "Outdoor".to_owned();
        let pothos = product("2", "Pothos", "12");
        let monstera = product("3", "Monstera", "40");
        let all = vec![outdoor, pothos.clone(), monstera];

        assert_eq!(categories(&all), ["Indoor", "Outdoor"]);

        let query = CatalogQuery {
            category: Some("outdoor".to_owned()),
            ..CatalogQuery::default()
        };
        assert_eq!(names(&query.run(all.clone())), ["Maple"]);

        let rel = related(&all, &pothos, 4);
        assert_eq!(rel.len(), 1);
        assert_eq!(rel[0].name, "Monstera");
    }

    #[test]
    fn test_product_deserializes_sparse_record() {
        let json = r#"{"id": 3, "name": "Snake Plant", "price": "$18", "sunlight": "Low", "petFriendly": false, "extra": 1}"#;
        let p: Product = serde_json::from_str(json).unwrap();
        assert_eq!(p.id.as_str(), "3");
        assert_eq!(p.stock, 0);
        assert_eq!(p.care.sunlight.as_deref(), Some("Low"));
        assert_eq!(
            p.care.attributes(),
            [("Sunlight", "Low".to_owned()), ("Pet friendly", "No".to_owned())]
        );
    }
}
