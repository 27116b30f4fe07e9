use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    /// Comma-separated tags
    pub tags: String,
    pub rating: Decimal,
    pub is_new: bool,
    pub is_sale: bool,
    pub is_featured: bool,
    pub is_trending: bool,
    pub stock: i32,
    pub is_active: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn is_in_stock(&self) -> bool {
        self.stock > 0 && self.is_active
    }

    pub fn tags_list(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(has_many = "super::stock_notification::Entity")]
    StockNotifications,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::stock_notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockNotifications.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(stock: i32, is_active: bool) -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "Test".into(),
            description: "Test product".into(),
            price: dec!(9.99),
            compare_at_price: None,
            category_id: None,
            tags: "one, two,,three ".into(),
            rating: dec!(0),
            is_new: false,
            is_sale: false,
            is_featured: false,
            is_trending: false,
            stock,
            is_active,
            image_url: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn in_stock_requires_active_and_positive_stock() {
        assert!(product(3, true).is_in_stock());
        assert!(!product(0, true).is_in_stock());
        assert!(!product(3, false).is_in_stock());
    }

    #[test]
    fn tags_list_trims_and_drops_empties() {
        assert_eq!(product(1, true).tags_list(), vec!["one", "two", "three"]);
    }
}
