// ============================================================================
// MODEL : USERS
// ============================================================================
//
// Columns of the users table:
//   - id (UUID, PRIMARY KEY)
//   - username (VARCHAR, UNIQUE, NOT NULL)
//   - email (VARCHAR, UNIQUE, NOT NULL)
//   - password_hash (VARCHAR, NOT NULL) - PHC string ($pbkdf2-sha256$i=..,l=32$salt$hash)
//   - first_name / last_name / avatar / phone (nullable)
//   - role (TEXT) - 'USER' | 'AGENT' | 'ADMIN'
//   - is_active (BOOLEAN, default TRUE)
//   - is_verified (BOOLEAN, default FALSE)
//   - verification_token (VARCHAR, nullable)
//   - reset_password_token (VARCHAR, nullable) + reset_password_expires (TIMESTAMPTZ)
//   - created_at / updated_at (TIMESTAMPTZ)
//
// Notes:
//   - Model deliberately has no Serialize impl. Anything leaving the API goes
//     through dto::SanitizedUser.
//   - The reset ticket is single-use: both reset columns are cleared by the
//     same UPDATE that installs the new hash.
//
// ============================================================================

use std::str::FromStr;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub verification_token: Option<String>,
    pub reset_password_token: Option<String>,
    pub reset_password_expires: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Closed set of roles. Stored as its upper-case name.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    #[sea_orm(string_value = "USER")]
    User,
    #[sea_orm(string_value = "AGENT")]
    Agent,
    #[sea_orm(string_value = "ADMIN")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Agent => "AGENT",
            Role::Admin => "ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "AGENT" => Ok(Role::Agent),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}
