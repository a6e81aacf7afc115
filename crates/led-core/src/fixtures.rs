//! Demo accounts and business units seeded into an empty register.

use chrono::{DateTime, TimeZone, Utc};
use led_store::RecordStore;
use led_types::{BusinessUnit, KvStore, Role, StoreError, User};

fn seeded_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn demo_user(id: &str, name: &str, employee_id: &str, position: &str, role: Role, login: &str) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        employee_id: employee_id.to_string(),
        position: position.to_string(),
        department: "Risk Management".to_string(),
        role,
        email: format!("{}@company.com", login),
        phone: format!("1380013800{}", id),
        is_active: true,
        created_at: seeded_at(),
        updated_at: seeded_at(),
    }
}

/// One account per role, all in Risk Management.
pub fn demo_users() -> Vec<User> {
    vec![
        demo_user("1", "Zhang San", "EMP001", "Risk Analyst", Role::Inputter, "zhangsan"),
        demo_user("2", "Li Si", "EMP002", "Risk Manager", Role::Approver, "lisi"),
        demo_user(
            "3",
            "Wang Wu",
            "EMP003",
            "Head of Risk Management",
            Role::Administrator,
            "wangwu",
        ),
    ]
}

pub fn demo_business_units() -> Vec<BusinessUnit> {
    [
        ("1", "RM", "Risk Management", "Risk management unit"),
        ("2", "ITD", "IT & Digital", "IT and digital unit"),
        ("3", "COMP", "Compliance", "Compliance unit"),
        ("4", "PROC", "Procurement", "Procurement unit"),
    ]
    .into_iter()
    .map(|(id, code, name, description)| BusinessUnit {
        id: id.to_string(),
        code: code.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        is_active: true,
        created_at: seeded_at(),
        updated_at: seeded_at(),
    })
    .collect()
}

/// Fill the users and business-unit collections if they are empty. Incidents are never seeded.
pub async fn seed_if_empty<S: KvStore>(store: &RecordStore<S>) -> Result<(), StoreError> {
    let seeded_users = store
        .mutate(|users: &mut Vec<User>| {
            let empty = users.is_empty();
            if empty {
                *users = demo_users();
            }
            Ok::<_, StoreError>(empty)
        })
        .await?;
    let seeded_units = store
        .mutate(|units: &mut Vec<BusinessUnit>| {
            let empty = units.is_empty();
            if empty {
                *units = demo_business_units();
            }
            Ok::<_, StoreError>(empty)
        })
        .await?;
    if seeded_users || seeded_units {
        tracing::info!(seeded_users, seeded_units, "seeded demo data");
    }
    Ok(())
}
