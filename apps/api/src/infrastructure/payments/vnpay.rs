//! VNPAY payment gateway (API version 2.1.0).
//!
//! Outgoing payment URLs and incoming return/IPN callbacks are signed the
//! same way: the `vnp_*` parameters except the hash itself are sorted by
//! key, form-encoded (space as `+`), joined with `&`, and signed with
//! HMAC-SHA512 using the merchant hash secret. The signature is hex encoded.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha512;
use uuid::Uuid;

use super::PaymentError;
use crate::config::VnpayConfig;

const VERSION: &str = "2.1.0";
const SECURE_HASH: &str = "vnp_SecureHash";
const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";
const PAYMENT_WINDOW_MINUTES: i64 = 15;
/// VNPAY timestamps are Vietnam local time (GMT+7)
const VIETNAM_OFFSET_HOURS: i64 = 7;

type HmacSha512 = Hmac<Sha512>;

/// Verified content of a return or IPN callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VnpayCallback {
    pub order_id: Uuid,
    /// Amount in VND (the wire value divided by 100)
    pub amount: Decimal,
    pub response_code: String,
    pub transaction_status: Option<String>,
    pub transaction_no: Option<String>,
}

impl VnpayCallback {
    /// True when both the response code and the transaction status report success
    pub fn is_success(&self) -> bool {
        self.response_code == "00" && self.transaction_status.as_deref().unwrap_or("00") == "00"
    }
}

/// Builds signed payment URLs and verifies callbacks
#[derive(Clone)]
pub struct VnpayGateway {
    config: VnpayConfig,
}

impl std::fmt::Debug for VnpayGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VnpayGateway")
            .field("tmn_code", &self.config.tmn_code)
            .field("hash_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl VnpayGateway {
    pub fn new(config: VnpayConfig) -> Self {
        Self { config }
    }

    /// Builds the URL the shopper is redirected to for paying `order_id`
    pub fn payment_url(
        &self,
        order_id: Uuid,
        amount: Decimal,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<String, PaymentError> {
        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), VERSION.to_string());
        params.insert("vnp_Command".to_string(), "pay".to_string());
        params.insert("vnp_TmnCode".to_string(), self.config.tmn_code.clone());
        params.insert("vnp_Locale".to_string(), "vn".to_string());
        params.insert("vnp_CurrCode".to_string(), "VND".to_string());
        params.insert("vnp_TxnRef".to_string(), order_id.to_string());
        params.insert(
            "vnp_OrderInfo".to_string(),
            format!("Thanh toan don hang {}", order_id),
        );
        params.insert("vnp_OrderType".to_string(), "other".to_string());
        params.insert("vnp_Amount".to_string(), wire_amount(amount)?);
        params.insert("vnp_ReturnUrl".to_string(), self.config.return_url.clone());
        params.insert("vnp_IpAddr".to_string(), client_ip.to_string());
        params.insert("vnp_CreateDate".to_string(), vietnam_timestamp(now));
        params.insert(
            "vnp_ExpireDate".to_string(),
            vietnam_timestamp(now + Duration::minutes(PAYMENT_WINDOW_MINUTES)),
        );

        let query = sign_data(&params);
        let signature = self.sign(&query)?;
        Ok(format!(
            "{}?{}&{}={}",
            self.config.payment_url, query, SECURE_HASH, signature
        ))
    }

    /// Checks the callback signature and extracts the payment result
    pub fn verify(&self, params: &BTreeMap<String, String>) -> Result<VnpayCallback, PaymentError> {
        let provided = params
            .get(SECURE_HASH)
            .ok_or(PaymentError::MissingParameter(SECURE_HASH))?;
        let provided = hex::decode(provided).map_err(|_| PaymentError::InvalidSignature)?;

        let mut mac = self.mac()?;
        mac.update(sign_data(params).as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| PaymentError::InvalidSignature)?;

        let required = |key: &'static str| {
            params
                .get(key)
                .cloned()
                .ok_or(PaymentError::MissingParameter(key))
        };

        let txn_ref = required("vnp_TxnRef")?;
        let order_id = Uuid::parse_str(&txn_ref)
            .map_err(|e| PaymentError::InvalidParameter("vnp_TxnRef", e.to_string()))?;
        let raw_amount = required("vnp_Amount")?;
        let amount = Decimal::from_str(&raw_amount)
            .map_err(|e| PaymentError::InvalidParameter("vnp_Amount", e.to_string()))?
            / Decimal::ONE_HUNDRED;

        Ok(VnpayCallback {
            order_id,
            amount,
            response_code: required("vnp_ResponseCode")?,
            transaction_status: params.get("vnp_TransactionStatus").cloned(),
            transaction_no: params.get("vnp_TransactionNo").cloned(),
        })
    }

    fn mac(&self) -> Result<HmacSha512, PaymentError> {
        HmacSha512::new_from_slice(self.config.hash_secret.as_bytes())
            .map_err(|e| PaymentError::InvalidParameter("hash secret", e.to_string()))
    }

    fn sign(&self, data: &str) -> Result<String, PaymentError> {
        let mut mac = self.mac()?;
        mac.update(data.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Sorted, encoded `key=value` pairs that make up the signed message
fn sign_data(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(key, value)| {
            key.starts_with("vnp_")
                && key.as_str() != SECURE_HASH
                && key.as_str() != SECURE_HASH_TYPE
                && !value.is_empty()
        })
        .map(|(key, value)| format!("{}={}", form_encode(key), form_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn form_encode(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

/// VND amount as the integer number of hundredths VNPAY expects
fn wire_amount(amount: Decimal) -> Result<String, PaymentError> {
    if amount.is_sign_negative() || amount.is_zero() {
        return Err(PaymentError::InvalidParameter(
            "vnp_Amount",
            "amount must be positive".to_string(),
        ));
    }
    Ok((amount * Decimal::ONE_HUNDRED).round().normalize().to_string())
}

fn vietnam_timestamp(at: DateTime<Utc>) -> String {
    (at + Duration::hours(VIETNAM_OFFSET_HOURS))
        .format("%Y%m%d%H%M%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ORDER_ID: &str = "5f0c6a3e-1b2d-4c5e-8f90-123456789abc";

    fn gateway() -> VnpayGateway {
        VnpayGateway::new(VnpayConfig {
            tmn_code: "DEMO1234".to_string(),
            hash_secret: "TESTSECRET".to_string(),
            payment_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "http://localhost:3000/payment/return".to_string(),
        })
    }

    fn callback_params() -> BTreeMap<String, String> {
        [
            ("vnp_Amount", "13000000"),
            ("vnp_TxnRef", ORDER_ID),
            ("vnp_OrderInfo", "Thanh toan don hang"),
            ("vnp_ResponseCode", "00"),
            ("vnp_TmnCode", "DEMO1234"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn sign_data_sorts_and_encodes_spaces_as_plus() {
        assert_eq!(
            sign_data(&callback_params()),
            "vnp_Amount=13000000&vnp_OrderInfo=Thanh+toan+don+hang&vnp_ResponseCode=00\
             &vnp_TmnCode=DEMO1234&vnp_TxnRef=5f0c6a3e-1b2d-4c5e-8f90-123456789abc"
        );
    }

    #[test]
    fn signature_matches_known_vector() {
        let gateway = gateway();
        let signature = gateway.sign(&sign_data(&callback_params())).unwrap();
        assert_eq!(
            signature,
            "c890f716ac0999d7a7f908f6ec8778b0fb2b9d1c03d93cc6bbace82795303d37\
             0065bb3f306a6c00a0d467911de7665dd141219d34f14d834b03f6a7233abe9a"
        );
    }

    #[test]
    fn verify_accepts_signed_callback() {
        let gateway = gateway();
        let mut params = callback_params();
        let signature = gateway.sign(&sign_data(&params)).unwrap();
        params.insert(SECURE_HASH.to_string(), signature);
        params.insert(SECURE_HASH_TYPE.to_string(), "HmacSHA512".to_string());

        let callback = gateway.verify(&params).unwrap();
        assert_eq!(callback.order_id, Uuid::parse_str(ORDER_ID).unwrap());
        assert_eq!(callback.amount, Decimal::new(130_000, 0));
        assert!(callback.is_success());
    }

    #[test]
    fn verify_rejects_tampered_amount() {
        let gateway = gateway();
        let mut params = callback_params();
        let signature = gateway.sign(&sign_data(&params)).unwrap();
        params.insert(SECURE_HASH.to_string(), signature);
        params.insert("vnp_Amount".to_string(), "100".to_string());

        assert_eq!(gateway.verify(&params), Err(PaymentError::InvalidSignature));
    }

    #[test]
    fn verify_requires_signature() {
        assert_eq!(
            gateway().verify(&callback_params()),
            Err(PaymentError::MissingParameter(SECURE_HASH))
        );
    }

    #[test]
    fn failed_transaction_status_is_not_success() {
        let callback = VnpayCallback {
            order_id: Uuid::nil(),
            amount: Decimal::ONE,
            response_code: "00".to_string(),
            transaction_status: Some("02".to_string()),
            transaction_no: None,
        };
        assert!(!callback.is_success());
    }

    #[test]
    fn payment_url_is_signed_and_in_vietnam_time() {
        let gateway = gateway();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap();
        let url = gateway
            .payment_url(Uuid::parse_str(ORDER_ID).unwrap(), Decimal::new(130_000, 0), "127.0.0.1", now)
            .unwrap();

        assert!(url.starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?"));
        assert!(url.contains("vnp_Amount=13000000"));
        assert!(url.contains("vnp_CreateDate=20240302013000"));
        assert!(url.contains("vnp_ExpireDate=20240302014500"));

        // The URL's own query round-trips through verify
        let query = url.split_once('?').unwrap().1;
        let params: BTreeMap<String, String> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| {
                let v = urlencoding::decode(&v.replace('+', " ")).unwrap().into_owned();
                (k.to_string(), v)
            })
            .collect();
        let mut unsigned = params.clone();
        unsigned.remove(SECURE_HASH);
        assert_eq!(params[SECURE_HASH], gateway.sign(&sign_data(&unsigned)).unwrap());
    }

    #[test]
    fn zero_amount_is_rejected() {
        let result = gateway().payment_url(Uuid::nil(), Decimal::ZERO, "127.0.0.1", Utc::now());
        assert!(result.is_err());
    }
}
