//! Page and image links for a restaurant.

use crate::model::Restaurant;

/// Restaurant detail page URL.
pub fn url_for_restaurant(restaurant: &Restaurant) -> String {
  format!("./restaurant.html?id={}", restaurant.id)
}

/// Restaurant image URL, falling back to the placeholder image.
pub fn image_url_for_restaurant(restaurant: &Restaurant) -> String {
  let filename = restaurant
    .photograph
    .as_deref()
    .filter(|p| !p.is_empty())
    .unwrap_or("placeholder");
  format!("/img/{}.webp", filename)
}
