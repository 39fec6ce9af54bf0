use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::db::entities::{ingredient, tag};
use crate::db::services::{RecipeDetail, RecipeWithLinks};
use crate::web::error::AppError;

/// A price with at most 5 digits and 2 decimal places, held in cents.
///
/// Serialized as a fixed two-decimal string (`"5.00"`); accepted as either a
/// JSON number or a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Price(i32);

impl Price {
    pub fn from_cents(cents: i32) -> Self {
        Price(cents)
    }

    pub fn cents(self) -> i32 {
        self.0
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let invalid = || format!("'{raw}' is not a valid price (expected e.g. 12.50)");

        let (whole, fraction) = match raw.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (raw, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if fraction.len() > 2 {
            return Err(format!("'{raw}' has more than 2 decimal places"));
        }
        let whole = whole.trim_start_matches('0');
        if whole.len() > 3 {
            return Err(format!("'{raw}' has more than 3 digits before the decimal point"));
        }

        let whole: i32 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
        let fraction: i32 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i32>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };
        Ok(Price(whole * 100 + fraction))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawPrice {
            Number(serde_json::Number),
            Text(String),
        }

        let raw = match RawPrice::deserialize(deserializer)? {
            RawPrice::Number(n) => n.to_string(),
            RawPrice::Text(s) => s,
        };
        Price::parse(&raw).map_err(de::Error::custom)
    }
}

/// Distinguishes an explicit `null` from an absent field in PATCH bodies.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagResponse {
    pub id: i32,
    pub name: String,
}

impl From<tag::Model> for TagResponse {
    fn from(tag: tag::Model) -> Self {
        TagResponse {
            id: tag.id,
            name: tag.name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngredientResponse {
    pub id: i32,
    pub name: String,
}

impl From<ingredient::Model> for IngredientResponse {
    fn from(ingredient: ingredient::Model) -> Self {
        IngredientResponse {
            id: ingredient.id,
            name: ingredient.name,
        }
    }
}

/// Body for creating or replacing a tag or an ingredient.
#[derive(Debug, Deserialize)]
pub struct NameRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NamePatchRequest {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecipeRequest {
    #[serde(default)]
    pub title: String,
    pub time_minutes: i32,
    pub price: Price,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub tags: Vec<i32>,
    #[serde(default)]
    pub ingredients: Vec<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipePatchRequest {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Price>,
    #[serde(default, deserialize_with = "present")]
    pub link: Option<Option<String>>,
    pub tags: Option<Vec<i32>>,
    pub ingredients: Option<Vec<i32>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RecipeResponse {
    pub id: i32,
    pub title: String,
    pub time_minutes: i32,
    pub price: Price,
    pub link: Option<String>,
    pub tags: Vec<i32>,
    pub ingredients: Vec<i32>,
}

impl From<RecipeWithLinks> for RecipeResponse {
    fn from(r: RecipeWithLinks) -> Self {
        RecipeResponse {
            id: r.recipe.id,
            title: r.recipe.title,
            time_minutes: r.recipe.time_minutes,
            price: Price::from_cents(r.recipe.price_cents),
            link: r.recipe.link,
            tags: r.tag_ids,
            ingredients: r.ingredient_ids,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RecipeDetailResponse {
    pub id: i32,
    pub title: String,
    pub time_minutes: i32,
    pub price: Price,
    pub link: Option<String>,
    pub tags: Vec<TagResponse>,
    pub ingredients: Vec<IngredientResponse>,
}

impl From<RecipeDetail> for RecipeDetailResponse {
    fn from(d: RecipeDetail) -> Self {
        RecipeDetailResponse {
            id: d.recipe.id,
            title: d.recipe.title,
            time_minutes: d.recipe.time_minutes,
            price: Price::from_cents(d.recipe.price_cents),
            link: d.recipe.link,
            tags: d.tags.into_iter().map(TagResponse::from).collect(),
            ingredients: d.ingredients.into_iter().map(IngredientResponse::from).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignedOnlyQuery {
    pub assigned_only: Option<String>,
}

impl AssignedOnlyQuery {
    pub fn assigned_only(&self) -> Result<bool, AppError> {
        match self.assigned_only.as_deref().map(str::trim) {
            None | Some("") | Some("0") | Some("false") => Ok(false),
            Some("1") | Some("true") => Ok(true),
            Some(other) => Err(AppError::InvalidInput(format!(
                "assigned_only must be 0 or 1, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipeListQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

/// Parses a comma separated id list such as `1,2,3`.
pub fn parse_id_list(field: &str, raw: Option<&str>) -> Result<Vec<i32>, AppError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i32>().map_err(|_| {
                AppError::InvalidInput(format!("{field} must be a comma separated list of ids"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_parses_numbers_and_strings() {
        let from_number: Price = serde_json::from_str("5.5").unwrap();
        assert_eq!(from_number.cents(), 550);

        let from_string: Price = serde_json::from_str("\"12.05\"").unwrap();
        assert_eq!(from_string.cents(), 1205);

        let whole: Price = serde_json::from_str("7").unwrap();
        assert_eq!(whole.cents(), 700);

        assert_eq!(Price::parse("999.99").unwrap().cents(), 99_999);
        assert_eq!(Price::parse(".5").unwrap().cents(), 50);
    }

    #[test]
    fn price_rejects_bad_values() {
        assert!(Price::parse("1000").is_err());
        assert!(Price::parse("1.234").is_err());
        assert!(Price::parse("-1").is_err());
        assert!(Price::parse("abc").is_err());
        assert!(Price::parse(".").is_err());
        assert!(serde_json::from_str::<Price>("true").is_err());
    }

    #[test]
    fn price_serializes_with_two_decimals() {
        assert_eq!(serde_json::to_string(&Price::from_cents(500)).unwrap(), "\"5.00\"");
        assert_eq!(Price::from_cents(1205).to_string(), "12.05");
    }

    #[test]
    fn patch_distinguishes_null_from_absent_link() {
        let absent: RecipePatchRequest = serde_json::from_str(r#"{"title": "Soup"}"#).unwrap();
        assert_eq!(absent.link, None);

        let cleared: RecipePatchRequest = serde_json::from_str(r#"{"link": null}"#).unwrap();
        assert_eq!(cleared.link, Some(None));
    }

    #[test]
    fn id_lists_are_parsed() {
        assert_eq!(parse_id_list("tags", Some("1, 2,3")).unwrap(), vec![1, 2, 3]);
        assert!(parse_id_list("tags", None).unwrap().is_empty());
        assert!(parse_id_list("tags", Some("1,x")).is_err());
    }

    #[test]
    fn assigned_only_flag() {
        let on = AssignedOnlyQuery {
            assigned_only: Some("1".to_string()),
        };
        assert!(on.assigned_only().unwrap());
        assert!(!AssignedOnlyQuery::default().assigned_only().unwrap());
        let bad = AssignedOnlyQuery {
            assigned_only: Some("yes".to_string()),
        };
        assert!(bad.assigned_only().is_err());
    }
}
