// Shipping carrier adapters

pub mod ghn;

pub use ghn::GhnClient;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::customer::Location;

/// Errors raised by a shipping provider
#[derive(Debug, Error)]
pub enum ShippingError {
    /// Transport failure or an unreadable response
    #[error("Shipping provider request failed: {0}")]
    Request(String),
    /// The provider answered with a non-success code
    #[error("Shipping provider error: {0}")]
    Provider(String),
    /// The submitted province/district/ward does not exist
    #[error("{0}")]
    UnknownLocation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Province {
    #[serde(rename(deserialize = "ProvinceID", serialize = "provinceId"))]
    pub province_id: i32,
    #[serde(rename(deserialize = "ProvinceName", serialize = "provinceName"))]
    pub province_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
    #[serde(rename(deserialize = "DistrictID", serialize = "districtId"))]
    pub district_id: i32,
    #[serde(rename(deserialize = "ProvinceID", serialize = "provinceId"))]
    pub province_id: i32,
    #[serde(rename(deserialize = "DistrictName", serialize = "districtName"))]
    pub district_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ward {
    #[serde(rename(deserialize = "WardCode", serialize = "wardCode"))]
    pub ward_code: String,
    #[serde(rename(deserialize = "DistrictID", serialize = "districtId"))]
    pub district_id: i32,
    #[serde(rename(deserialize = "WardName", serialize = "wardName"))]
    pub ward_name: String,
}

/// Parcel description used to quote a delivery fee
#[derive(Debug, Clone, PartialEq)]
pub struct FeeRequest {
    pub to_district_id: i32,
    pub to_ward_code: String,
    /// Grams
    pub weight: u32,
    /// Declared value in VND
    pub insurance_value: Decimal,
}

/// Carrier master data and fee quotes
#[async_trait]
pub trait ShippingProvider: Send + Sync {
    async fn provinces(&self) -> Result<Vec<Province>, ShippingError>;

    async fn districts(&self, province_id: i32) -> Result<Vec<District>, ShippingError>;

    async fn wards(&self, district_id: i32) -> Result<Vec<Ward>, ShippingError>;

    /// Delivery fee in VND
    async fn fee(&self, request: &FeeRequest) -> Result<Decimal, ShippingError>;
}

/// Checks a province/district/ward triple against the carrier and returns
/// a location carrying the carrier's names
pub async fn resolve_location(
    provider: &dyn ShippingProvider,
    street: &str,
    province_id: i32,
    district_id: i32,
    ward_code: &str,
) -> Result<Location, ShippingError> {
    let province = provider
        .provinces()
        .await?
        .into_iter()
        .find(|p| p.province_id == province_id)
        .ok_or_else(|| ShippingError::UnknownLocation(format!("Unknown province {}", province_id)))?;

    let district = provider
        .districts(province_id)
        .await?
        .into_iter()
        .find(|d| d.district_id == district_id)
        .ok_or_else(|| {
            ShippingError::UnknownLocation(format!(
                "District {} is not in province {}",
                district_id, province_id
            ))
        })?;

    let ward = provider
        .wards(district_id)
        .await?
        .into_iter()
        .find(|w| w.ward_code == ward_code)
        .ok_or_else(|| {
            ShippingError::UnknownLocation(format!(
                "Ward {} is not in district {}",
                ward_code, district_id
            ))
        })?;

    Location::new(
        street,
        (province.province_id, &province.province_name),
        (district.district_id, &district.district_name),
        (&ward.ward_code, &ward.ward_name),
    )
    .map_err(|e| ShippingError::UnknownLocation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCarrier;

    #[async_trait]
    impl ShippingProvider for FixedCarrier {
        async fn provinces(&self) -> Result<Vec<Province>, ShippingError> {
            Ok(vec![Province {
                province_id: 202,
                province_name: "Hồ Chí Minh".into(),
            }])
        }

        async fn districts(&self, province_id: i32) -> Result<Vec<District>, ShippingError> {
            Ok(vec![District {
                district_id: 1442,
                province_id,
                district_name: "Quận 1".into(),
            }])
        }

        async fn wards(&self, district_id: i32) -> Result<Vec<Ward>, ShippingError> {
            Ok(vec![Ward {
                ward_code: "20109".into(),
                district_id,
                ward_name: "Phường Bến Nghé".into(),
            }])
        }

        async fn fee(&self, _request: &FeeRequest) -> Result<Decimal, ShippingError> {
            Ok(Decimal::new(22_000, 0))
        }
    }

    #[tokio::test]
    async fn resolve_fills_carrier_names() {
        let location = resolve_location(&FixedCarrier, "12 Nguyễn Huệ", 202, 1442, "20109")
            .await
            .unwrap();

        assert_eq!(location.province_name, "Hồ Chí Minh");
        assert_eq!(location.district_name, "Quận 1");
        assert_eq!(location.ward_name, "Phường Bến Nghé");
    }

    #[tokio::test]
    async fn resolve_rejects_unknown_ward() {
        let err = resolve_location(&FixedCarrier, "12 Nguyễn Huệ", 202, 1442, "99999")
            .await
            .unwrap_err();
        assert!(matches!(err, ShippingError::UnknownLocation(_)));
    }

    #[test]
    fn ghn_master_data_deserializes() {
        let json = r#"{"ProvinceID": 201, "ProvinceName": "Hà Nội", "Code": "4"}"#;
        let province: Province = serde_json::from_str(json).unwrap();
        assert_eq!(province.province_id, 201);

        let out = serde_json::to_value(&province).unwrap();
        assert_eq!(out["provinceName"], "Hà Nội");
    }
}
