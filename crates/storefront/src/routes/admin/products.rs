//! Back-office product management.

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::instrument;

use verdora_core::{CareProfile, FieldErrors, NewProduct, Price, Product, ProductId};

use crate::data::DataError;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdmin, Shopper};
use crate::models::Flash;
use crate::routes::forms::{ChoiceView, FieldView, SelectView};
use crate::routes::products::ProductCard;
use crate::routes::{Chrome, redirect_with};
use crate::state::AppState;

/// Free-text care attributes, keyed by their record field names.
const CARE_TEXT_FIELDS: [(&str, &str); 19] = [
    ("botanicalName", "Botanical name"),
    ("sunlight", "Sunlight"),
    ("watering", "Watering"),
    ("humidity", "Humidity"),
    ("temperature", "Temperature"),
    ("soil", "Soil"),
    ("fertilizer", "Fertilizer"),
    ("growthRate", "Growth rate"),
    ("matureSize", "Mature size"),
    ("potSize", "Pot size"),
    ("bloomSeason", "Bloom season"),
    ("flowerColor", "Flower color"),
    ("foliageColor", "Foliage color"),
    ("careLevel", "Care level"),
    ("origin", "Origin"),
    ("hardinessZone", "Hardiness zone"),
    ("propagation", "Propagation"),
    ("pruning", "Pruning"),
    ("repotting", "Repotting"),
];

/// Yes/no care attributes; left blank they stay unknown.
const CARE_FLAG_FIELDS: [(&str, &str); 2] = [
    ("petFriendly", "Pet friendly"),
    ("airPurifying", "Air purifying"),
];

/// Product editor form data.
///
/// Everything arrives as text so a bad value can be shown back with its
/// error. Care attributes are collected from the remaining fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub stock: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub rating: String,
    pub best_selling: Option<String>,
    pub new_arrival: Option<String>,
    #[serde(flatten)]
    pub care: HashMap<String, String>,
}

impl ProductForm {
    fn care_value(&self, key: &str) -> &str {
        self.care.get(key).map_or("", |v| v.trim())
    }

    /// Validate into a product record.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(&self) -> Result<NewProduct, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = errors.require("name", &self.name, "Name is required").to_string();
        let price = errors.require("price", &self.price, "Price is required").to_string();
        if !price.is_empty() {
            match Price::parse(&price) {
                None => errors.add("price", "Enter a price such as 24.99"),
                Some(amount) if amount < Price::ZERO => {
                    errors.add("price", "Price cannot be negative");
                }
                Some(_) => {}
            }
        }

        let stock = match self.stock.trim() {
            "" => 0,
            raw => raw.parse::<u32>().unwrap_or_else(|_| {
                errors.add("stock", "Stock must be a whole number");
                0
            }),
        };

        let rating = match self.rating.trim() {
            "" => None,
            raw => match raw.parse::<f32>() {
                Ok(r) if (0.0..=5.0).contains(&r) => Some(r),
                _ => {
                    errors.add("rating", "Rating must be between 0 and 5");
                    None
                }
            },
        };

        let image = self.image.trim().to_string();
        if !image.is_empty()
            && !["http://", "https://", "/"]
                .iter()
                .any(|prefix| image.starts_with(prefix))
        {
            errors.add("image", "Image must be a URL or a /static path");
        }

        let mut care = Map::new();
        for (key, _) in CARE_TEXT_FIELDS {
            let value = self.care_value(key);
            if !value.is_empty() {
                care.insert(key.to_string(), Value::String(value.to_string()));
            }
        }
        for (key, _) in CARE_FLAG_FIELDS {
            match self.care_value(key) {
                "yes" => care.insert(key.to_string(), Value::Bool(true)),
                "no" => care.insert(key.to_string(), Value::Bool(false)),
                _ => None,
            };
        }
        let care: CareProfile = serde_json::from_value(Value::Object(care)).unwrap_or_default();

        errors.into_result(NewProduct {
            name,
            description: self.description.trim().to_string(),
            price,
            stock,
            category: self.category.trim().to_string(),
            image,
            best_selling: self.best_selling.is_some(),
            new_arrival: self.new_arrival.is_some(),
            rating,
            care,
        })
    }

    fn fields(&self, errors: &FieldErrors) -> Vec<FieldView> {
        vec![
            FieldView::new("name", "Name", "text", &self.name, errors),
            FieldView::new("price", "Price", "text", &self.price, errors),
            FieldView::new("stock", "Stock", "number", &self.stock, errors),
            FieldView::new("category", "Category", "text", &self.category, errors),
            FieldView::new("image", "Image URL", "url", &self.image, errors),
            FieldView::new("rating", "Rating", "number", &self.rating, errors),
            FieldView::new("description", "Description", "textarea", &self.description, errors),
        ]
    }

    fn care_fields(&self, errors: &FieldErrors) -> Vec<FieldView> {
        CARE_TEXT_FIELDS
            .into_iter()
            .map(|(key, label)| FieldView::new(key, label, "text", self.care_value(key), errors))
            .collect()
    }

    fn flags(&self) -> Vec<ChoiceView> {
        vec![
            ChoiceView {
                value: "best_selling",
                label: "Best seller",
                selected: self.best_selling.is_some(),
            },
            ChoiceView {
                value: "new_arrival",
                label: "New arrival",
                selected: self.new_arrival.is_some(),
            },
        ]
    }

    fn care_flags(&self) -> Vec<SelectView> {
        CARE_FLAG_FIELDS
            .into_iter()
            .map(|(key, label)| {
                let current = self.care_value(key);
                SelectView {
                    name: key,
                    label,
                    options: [("", "Unknown"), ("yes", "Yes"), ("no", "No")]
                        .into_iter()
                        .map(|(value, label)| ChoiceView {
                            value,
                            label,
                            selected: current == value,
                        })
                        .collect(),
                }
            })
            .collect()
    }
}

impl From<&Product> for ProductForm {
    fn from(product: &Product) -> Self {
        let mut care = HashMap::new();
        if let Ok(Value::Object(record)) = serde_json::to_value(&product.care) {
            for (key, value) in record {
                let text = match value {
                    Value::String(s) => s,
                    Value::Bool(true) => "yes".to_string(),
                    Value::Bool(false) => "no".to_string(),
                    _ => continue,
                };
                care.insert(key, text);
            }
        }

        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.clone(),
            stock: product.stock.to_string(),
            category: product.category.clone(),
            image: product.image.clone(),
            rating: product.rating.map(|r| r.to_string()).unwrap_or_default(),
            best_selling: product.best_selling.then(|| "on".to_string()),
            new_arrival: product.new_arrival.then(|| "on".to_string()),
            care,
        }
    }
}

/// Product listing template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products/index.html")]
pub struct ProductsIndexTemplate {
    pub chrome: Chrome,
    pub products: Vec<ProductCard>,
}

/// Product editor template, shared by create and edit.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products/form.html")]
pub struct ProductFormTemplate {
    pub chrome: Chrome,
    pub title: String,
    pub action: String,
    pub fields: Vec<FieldView>,
    pub care_fields: Vec<FieldView>,
    pub flags: Vec<ChoiceView>,
    pub care_flags: Vec<SelectView>,
}

impl ProductFormTemplate {
    fn new(
        chrome: Chrome,
        title: String,
        action: String,
        form: &ProductForm,
        errors: &FieldErrors,
    ) -> Self {
        Self {
            chrome,
            title,
            action,
            fields: form.fields(errors),
            care_fields: form.care_fields(errors),
            flags: form.flags(),
            care_flags: form.care_flags(),
        }
    }
}

async fn fetch(state: &AppState, id: &ProductId) -> Result<Product, AppError> {
    state
        .data()
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {id}")))
}

/// List every product.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
) -> Result<impl IntoResponse, AppError> {
    let products = state.data().list_products().await?;

    Ok(ProductsIndexTemplate {
        chrome: Chrome::load(&state, &shopper, "/admin/products").await?,
        products: products.iter().map(ProductCard::from).collect(),
    })
}

/// Display an empty product editor.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn new_page(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
) -> Result<impl IntoResponse, AppError> {
    Ok(ProductFormTemplate::new(
        Chrome::load(&state, &shopper, "/admin/products").await?,
        "New plant".to_string(),
        "/admin/products".to_string(),
        &ProductForm::default(),
        &FieldErrors::new(),
    ))
}

/// Create a product.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
    Form(form): Form<ProductForm>,
) -> Result<Response, AppError> {
    match form.validate() {
        Ok(product) => {
            let created = state.data().create_product(&product).await?;
            tracing::info!(product_id = %created.id, "Product created");
            Ok(redirect_with(
                &shopper.session,
                Flash::success(format!("{} created", created.name)),
                "/admin/products",
            )
            .await
            .into_response())
        }
        Err(errors) => {
            let page = ProductFormTemplate::new(
                Chrome::load(&state, &shopper, "/admin/products").await?,
                "New plant".to_string(),
                "/admin/products".to_string(),
                &form,
                &errors,
            );
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
    }
}

/// Display the editor for an existing product.
#[instrument(skip(state, admin, shopper), fields(admin_id = %admin.id))]
pub async fn edit_page(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let product = fetch(&state, &ProductId::new(id)).await?;

    Ok(ProductFormTemplate::new(
        Chrome::load(&state, &shopper, "/admin/products").await?,
        format!("Edit {}", product.name),
        format!("/admin/products/{}", product.id),
        &ProductForm::from(&product),
        &FieldErrors::new(),
    ))
}

/// Replace a product record.
#[instrument(skip(state, admin, shopper, form), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
    Path(id): Path<String>,
    Form(form): Form<ProductForm>,
) -> Result<Response, AppError> {
    let id = ProductId::new(id);
    match form.validate() {
        Ok(product) => {
            let updated = match state.data().update_product(&id, &product).await {
                Ok(updated) => updated,
                Err(DataError::NotFound(_)) => {
                    return Err(AppError::NotFound(format!("Product {id}")));
                }
                Err(e) => return Err(e.into()),
            };
            tracing::info!(product_id = %updated.id, "Product updated");
            Ok(redirect_with(
                &shopper.session,
                Flash::success(format!("{} saved", updated.name)),
                "/admin/products",
            )
            .await
            .into_response())
        }
        Err(errors) => {
            let page = ProductFormTemplate::new(
                Chrome::load(&state, &shopper, "/admin/products").await?,
                format!("Edit {}", form.name.trim()),
                format!("/admin/products/{id}"),
                &form,
                &errors,
            );
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
    }
}

/// Delete a product. Carts that still hold it are rejected at checkout.
#[instrument(skip(state, admin, shopper), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let id = ProductId::new(id);
    let flash = match state.data().delete_product(&id).await {
        Ok(()) => {
            tracing::info!(product_id = %id, "Product deleted");
            Flash::success("Product deleted")
        }
        Err(DataError::NotFound(_)) => Flash::error("That product no longer exists"),
        Err(e) => return Err(e.into()),
    };
    Ok(redirect_with(&shopper.session, flash, "/admin/products").await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn filled() -> ProductForm {
        let mut form = ProductForm {
            name: " Fiddle Leaf Fig ".to_string(),
            price: "49.90".to_string(),
            stock: "7".to_string(),
            category: "Trees".to_string(),
            image: "https://images.example.com/fig.jpg".to_string(),
            rating: "4.5".to_string(),
            best_selling: Some("on".to_string()),
            ..ProductForm::default()
        };
        form.care.insert("sunlight".to_string(), "Bright, indirect".to_string());
        form.care.insert("petFriendly".to_string(), "no".to_string());
        form
    }

    #[test]
    fn test_validate_builds_product() {
        let product = filled().validate().unwrap();
        assert_eq!(product.name, "Fiddle Leaf Fig");
        assert_eq!(product.stock, 7);
        assert_eq!(product.rating, Some(4.5));
        assert!(product.best_selling);
        assert!(!product.new_arrival);
        assert_eq!(product.care.sunlight.as_deref(), Some("Bright, indirect"));
        assert_eq!(product.care.pet_friendly, Some(false));
        assert_eq!(product.care.air_purifying, None);
    }

    #[test]
    fn test_validate_reports_each_bad_field() {
        let form = ProductForm {
            price: "cheap".to_string(),
            stock: "-2".to_string(),
            rating: "7".to_string(),
            image: "ftp://fig.jpg".to_string(),
            ..ProductForm::default()
        };
        let errors = form.validate().unwrap_err();
        for field in ["name", "price", "stock", "rating", "image"] {
            assert!(errors.has(field), "expected an error for {field}");
        }
    }

    #[test]
    fn test_negative_price_is_rejected() {
        for price in ["-5", "-$0.01"] {
            let form = ProductForm {
                price: price.to_string(),
                ..filled()
            };
            let errors = form.validate().unwrap_err();
            assert_eq!(errors.get("price"), Some("Price cannot be negative"), "{price}");
        }

        let free = ProductForm {
            price: "0".to_string(),
            ..filled()
        };
        assert!(free.validate().is_ok());
    }

    #[test]
    fn test_blank_stock_defaults_to_zero() {
        let form = ProductForm {
            stock: String::new(),
            ..filled()
        };
        assert_eq!(form.validate().unwrap().stock, 0);
    }

    #[test]
    fn test_form_from_product_round_trips_care() {
        let product: Product = serde_json::from_value(serde_json::json!({
            "id": "5",
            "name": "Peace Lily",
            "price": "18.00",
            "stock": 3,
            "airPurifying": true,
            "watering": "Weekly"
        }))
        .unwrap();

        let form = ProductForm::from(&product);
        assert_eq!(form.care_value("watering"), "Weekly");
        assert_eq!(form.care_value("airPurifying"), "yes");
        assert_eq!(form.care_value("petFriendly"), "");

        let saved = form.validate().unwrap();
        assert_eq!(saved.care, product.care);
        assert_eq!(saved.stock, 3);
    }

    #[test]
    fn test_care_flags_select_current_value() {
        let flags = filled().care_flags();
        let pet = flags.iter().find(|f| f.name == "petFriendly").unwrap();
        let selected: Vec<&str> = pet
            .options
            .iter()
            .filter(|o| o.selected)
            .map(|o| o.value)
            .collect();
        assert_eq!(selected, vec!["no"]);
    }
}
