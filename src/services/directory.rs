use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Caller, Role, User};

/// The user behind `id`, if it is a trainer.
pub fn resolve_trainer(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    Ok(queries::get_user(conn, id)?.filter(|u| u.role == Role::Trainer))
}

pub fn list_trainers(conn: &Connection) -> anyhow::Result<Vec<User>> {
    queries::list_users_by_role(conn, Role::Trainer)
}

/// Members actively assigned to the calling trainer.
pub fn my_members(conn: &Connection, caller: &Caller) -> Result<Vec<User>, AppError> {
    if caller.role != Role::Trainer {
        return Err(AppError::Forbidden("only trainers have assigned members".to_string()));
    }
    Ok(queries::assigned_members(conn, &caller.id)?)
}

/// Binds or unbinds a trainer and a member.
pub fn set_assignment(
    conn: &Connection,
    trainer_id: &str,
    member_id: &str,
    active: bool,
) -> Result<(), AppError> {
    if resolve_trainer(conn, trainer_id)?.is_none() {
        return Err(AppError::Validation(format!("{trainer_id} is not a trainer")));
    }
    match queries::get_user(conn, member_id)? {
        Some(u) if u.role == Role::Member => {}
        _ => return Err(AppError::Validation(format!("{member_id} is not a member"))),
    }

    queries::set_assignment(conn, trainer_id, member_id, active)?;
    tracing::info!(trainer = trainer_id, member = member_id, active, "trainer assignment updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        for (id, role) in [("m1", Role::Member), ("t1", Role::Trainer), ("t2", Role::Trainer)] {
            let user = User {
                id: id.to_string(),
                username: id.to_string(),
                role,
                push_token: None,
            };
            queries::insert_user(&conn, &user, &format!("hash-{id}")).unwrap();
        }
        conn
    }

    #[test]
    fn test_resolve_trainer_filters_role() {
        let conn = setup_db();
        assert!(resolve_trainer(&conn, "t1").unwrap().is_some());
        assert!(resolve_trainer(&conn, "m1").unwrap().is_none());
        assert!(resolve_trainer(&conn, "ghost").unwrap().is_none());
        assert_eq!(list_trainers(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_assignment_requires_matching_roles() {
        let conn = setup_db();
        assert!(matches!(
            set_assignment(&conn, "m1", "t1", true),
            Err(AppError::Validation(_))
        ));
        set_assignment(&conn, "t1", "m1", true).unwrap();

        let t1 = Caller { id: "t1".to_string(), role: Role::Trainer };
        let members = my_members(&conn, &t1).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, "m1");

        let m1 = Caller { id: "m1".to_string(), role: Role::Member };
        assert!(matches!(my_members(&conn, &m1), Err(AppError::Forbidden(_))));
    }
}
