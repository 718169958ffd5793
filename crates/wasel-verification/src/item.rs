//! Verification items and their seed data.

use crate::VerificationState;
use serde::{Deserialize, Serialize};
use std::fmt;
use wasel_schema::Profile;

/// Rejection reason shipped with the seeded selfie item.
pub const SEED_SELFIE_REJECTION: &str = "Image quality too low. Please retake in good lighting.";

/// The kinds of verification a user can complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationKind {
    Phone,
    Email,
    NationalId,
    DriversLicense,
    Selfie,
}

impl VerificationKind {
    pub const ALL: [VerificationKind; 5] = [
        VerificationKind::Phone,
        VerificationKind::Email,
        VerificationKind::NationalId,
        VerificationKind::DriversLicense,
        VerificationKind::Selfie,
    ];

    /// Stable identifier used by callers and in persisted state.
    pub fn id(&self) -> &'static str {
        match self {
            VerificationKind::Phone => "phone",
            VerificationKind::Email => "email",
            VerificationKind::NationalId => "national_id",
            VerificationKind::DriversLicense => "drivers_license",
            VerificationKind::Selfie => "selfie",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Verified by uploading a document rather than confirming a code.
    pub fn is_document(&self) -> bool {
        !matches!(self, VerificationKind::Phone | VerificationKind::Email)
    }

    /// Content types accepted for this kind's upload.
    pub fn accepted_content_types(&self) -> &'static [&'static str] {
        match self {
            VerificationKind::Phone | VerificationKind::Email => &[],
            VerificationKind::Selfie => &["image/jpeg", "image/png", "image/heic"],
            VerificationKind::NationalId | VerificationKind::DriversLicense => {
                &["image/jpeg", "image/png", "image/heic", "application/pdf"]
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VerificationKind::Phone => "Phone Number",
            VerificationKind::Email => "Email Address",
            VerificationKind::NationalId => "National ID / Emirates ID",
            VerificationKind::DriversLicense => "Driver's License",
            VerificationKind::Selfie => "Selfie Verification",
        }
    }

    pub fn name_ar(&self) -> &'static str {
        match self {
            VerificationKind::Phone => "رقم الهاتف",
            VerificationKind::Email => "البريد الإلكتروني",
            VerificationKind::NationalId => "بطاقة الهوية الوطنية / هوية الإمارات",
            VerificationKind::DriversLicense => "رخصة القيادة",
            VerificationKind::Selfie => "التحقق بالصورة الشخصية",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            VerificationKind::Phone => "Verify your phone number via SMS",
            VerificationKind::Email => "Verify your email address",
            VerificationKind::NationalId => "Upload a photo of your government-issued ID",
            VerificationKind::DriversLicense => "Required to offer rides as a driver",
            VerificationKind::Selfie => "Take a selfie to verify your identity",
        }
    }

    pub fn description_ar(&self) -> &'static str {
        match self {
            VerificationKind::Phone => "تحقق من رقم هاتفك عبر الرسائل القصيرة",
            VerificationKind::Email => "تحقق من عنوان بريدك الإلكتروني",
            VerificationKind::NationalId => "قم بتحميل صورة من بطاقة الهوية الحكومية",
            VerificationKind::DriversLicense => "مطلوب لتقديم الرحلات كسائق",
            VerificationKind::Selfie => "التقط صورة شخصية للتحقق من هويتك",
        }
    }

    /// Only the driver's license is optional; riders never need one.
    pub fn is_required_by_default(&self) -> bool {
        !matches!(self, VerificationKind::DriversLicense)
    }
}

impl fmt::Display for VerificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One entry in the verification checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationItem {
    pub kind: VerificationKind,
    pub required: bool,
    #[serde(flatten)]
    pub state: VerificationState,
}

impl VerificationItem {
    pub fn new(kind: VerificationKind, required: bool, state: VerificationState) -> Self {
        Self {
            kind,
            required,
            state,
        }
    }

    pub fn id(&self) -> &'static str {
        self.kind.id()
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.state.rejection_reason()
    }
}

/// The checklist shipped with the app before verification had a backend.
pub fn default_items() -> Vec<VerificationItem> {
    use VerificationKind::*;

    vec![
        VerificationItem::new(Phone, true, VerificationState::Approved),
        VerificationItem::new(Email, true, VerificationState::Approved),
        VerificationItem::new(NationalId, true, VerificationState::Pending),
        VerificationItem::new(DriversLicense, false, VerificationState::NotStarted),
        VerificationItem::new(
            Selfie,
            true,
            VerificationState::rejected(SEED_SELFIE_REJECTION),
        ),
    ]
}

/// Build the checklist for a signed-in user.
///
/// Phone and email follow the profile's verified flags. Document review
/// results are not stored on the profile, so document items start fresh.
pub fn items_from_profile(profile: &Profile) -> Vec<VerificationItem> {
    VerificationKind::ALL
        .into_iter()
        .map(|kind| {
            let verified = match kind {
                VerificationKind::Phone => profile.phone_verified,
                VerificationKind::Email => profile.email_verified,
                _ => false,
            };
            let state = if verified {
                VerificationState::Approved
            } else {
                VerificationState::NotStarted
            };
            VerificationItem::new(kind, kind.is_required_by_default(), state)
        })
        .collect()
}
