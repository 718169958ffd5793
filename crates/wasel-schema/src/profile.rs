//! The `profiles` table.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_COUNTRY: &str = "AE";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_CURRENCY: &str = "AED";

/// A `profiles` row: application attributes stored alongside the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub full_name: String,
    pub full_name_ar: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub bio_ar: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub country: String,
    pub phone_verified: bool,
    pub email_verified: bool,
    pub is_verified: bool,
    pub verification_level: i32,
    pub total_trips: i32,
    pub trips_as_driver: i32,
    pub trips_as_passenger: i32,
    pub rating_as_driver: f64,
    pub rating_as_passenger: f64,
    pub total_ratings_received: i32,
    pub smoking_allowed: bool,
    pub pets_allowed: bool,
    pub music_allowed: bool,
    pub conversation_level: Option<String>,
    pub preferred_temperature: Option<String>,
    pub language: String,
    pub currency: String,
    pub notification_enabled: bool,
    pub location_sharing_enabled: bool,
    pub wallet_balance: f64,
    pub total_earned: f64,
    pub total_spent: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Materialize a row from an insert payload using the column defaults.
    pub fn from_insert(new: &NewProfile, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            full_name: new.full_name.clone(),
            full_name_ar: None,
            avatar_url: None,
            bio: None,
            bio_ar: None,
            date_of_birth: None,
            gender: None,
            city: None,
            country: DEFAULT_COUNTRY.to_string(),
            phone_verified: new.phone_verified,
            email_verified: new.email_verified,
            is_verified: false,
            verification_level: 0,
            total_trips: 0,
            trips_as_driver: 0,
            trips_as_passenger: 0,
            rating_as_driver: 0.0,
            rating_as_passenger: 0.0,
            total_ratings_received: 0,
            smoking_allowed: false,
            pets_allowed: false,
            music_allowed: true,
            conversation_level: None,
            preferred_temperature: None,
            language: DEFAULT_LANGUAGE.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            notification_enabled: true,
            location_sharing_enabled: false,
            wallet_balance: 0.0,
            total_earned: 0.0,
            total_spent: 0.0,
            created_at: now,
            updated_at: now,
            last_active_at: now,
            deleted_at: None,
        }
    }

    /// Soft-deleted rows are kept for bookkeeping but hidden from the app.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Insert payload written right after sign-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub full_name: String,
    pub email_verified: bool,
    pub phone_verified: bool,
}

/// Partial update of the user-editable profile columns.
///
/// `None` leaves a column untouched. For nullable columns, `Some(None)`
/// clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name_ar: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio_ar: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoking_allowed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pets_allowed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_allowed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_level: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_temperature: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_sharing_enabled: Option<bool>,
}

impl ProfileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn phone(mut self, phone: Option<String>) -> Self {
        self.phone = Some(phone);
        self
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(Some(city.into()));
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn bio(mut self, bio: Option<String>) -> Self {
        self.bio = Some(bio);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// No column would change.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply the update to a cached row, bumping `updated_at`.
    pub fn apply_to(&self, profile: &mut Profile, now: DateTime<Utc>) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut profile.phone, &self.phone);
        set(&mut profile.full_name, &self.full_name);
        set(&mut profile.full_name_ar, &self.full_name_ar);
        set(&mut profile.avatar_url, &self.avatar_url);
        set(&mut profile.bio, &self.bio);
        set(&mut profile.bio_ar, &self.bio_ar);
        set(&mut profile.date_of_birth, &self.date_of_birth);
        set(&mut profile.gender, &self.gender);
        set(&mut profile.city, &self.city);
        set(&mut profile.country, &self.country);
        set(&mut profile.smoking_allowed, &self.smoking_allowed);
        set(&mut profile.pets_allowed, &self.pets_allowed);
        set(&mut profile.music_allowed, &self.music_allowed);
        set(&mut profile.conversation_level, &self.conversation_level);
        set(&mut profile.preferred_temperature, &self.preferred_temperature);
        set(&mut profile.language, &self.language);
        set(&mut profile.currency, &self.currency);
        set(&mut profile.notification_enabled, &self.notification_enabled);
        set(
            &mut profile.location_sharing_enabled,
            &self.location_sharing_enabled,
        );
        profile.updated_at = now;
    }
}
