use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Booking, BookingStatus, Role, User};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const BOOKING_COLUMNS: &str =
    "id, member_id, trainer_id, start_time, end_time, status, notes, created_at, updated_at";

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| anyhow::anyhow!("invalid stored timestamp {s:?}: {e}"))?;
    Ok(naive.and_utc())
}

// ── Users ──

pub fn insert_user(conn: &Connection, user: &User, token_hash: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, role, token_hash, push_token) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.id,
            user.username,
            user.role.as_str(),
            token_hash,
            user.push_token,
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, role, push_token FROM users WHERE id = ?1",
            params![id],
            |row| Ok(parse_user_row(row)),
        )
        .optional()?;
    user.transpose()
}

pub fn get_user_by_token_hash(conn: &Connection, token_hash: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, role, push_token FROM users WHERE token_hash = ?1",
            params![token_hash],
            |row| Ok(parse_user_row(row)),
        )
        .optional()?;
    user.transpose()
}

pub fn list_users_by_role(conn: &Connection, role: Role) -> anyhow::Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, role, push_token FROM users WHERE role = ?1 ORDER BY username ASC",
    )?;
    let rows = stmt.query_map(params![role.as_str()], |row| Ok(parse_user_row(row)))?;

    let mut users = vec![];
    for row in rows {
        users.push(row??);
    }
    Ok(users)
}

pub fn set_push_token(conn: &Connection, id: &str, token: Option<&str>) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET push_token = ?1 WHERE id = ?2",
        params![token, id],
    )?;
    Ok(count > 0)
}

fn parse_user_row(row: &rusqlite::Row) -> anyhow::Result<User> {
    let role_str: String = row.get(2)?;
    let role = Role::parse(&role_str)
        .ok_or_else(|| anyhow::anyhow!("unknown role in storage: {role_str}"))?;

    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        role,
        push_token: row.get(3)?,
    })
}

// ── Trainer Assignments ──

pub fn set_assignment(
    conn: &Connection,
    trainer_id: &str,
    member_id: &str,
    active: bool,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO trainer_assignments (trainer_id, member_id, is_active) VALUES (?1, ?2, ?3)
         ON CONFLICT(trainer_id, member_id) DO UPDATE SET is_active = excluded.is_active",
        params![trainer_id, member_id, active as i32],
    )?;
    Ok(())
}

pub fn has_active_assignment(
    conn: &Connection,
    trainer_id: &str,
    member_id: &str,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM trainer_assignments
         WHERE trainer_id = ?1 AND member_id = ?2 AND is_active = 1",
        params![trainer_id, member_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn assigned_members(conn: &Connection, trainer_id: &str) -> anyhow::Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.role, u.push_token
         FROM trainer_assignments a
         INNER JOIN users u ON u.id = a.member_id
         WHERE a.trainer_id = ?1 AND a.is_active = 1
         ORDER BY a.started_at ASC, u.username ASC",
    )?;
    let rows = stmt.query_map(params![trainer_id], |row| Ok(parse_user_row(row)))?;

    let mut members = vec![];
    for row in rows {
        members.push(row??);
    }
    Ok(members)
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, member_id, trainer_id, start_time, end_time, status, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            booking.id,
            booking.member_id,
            booking.trainer_id,
            format_timestamp(&booking.start_time),
            format_timestamp(&booking.end_time),
            booking.status.as_str(),
            booking.notes,
            format_timestamp(&booking.created_at),
            format_timestamp(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;
    booking.transpose()
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    now: &DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), format_timestamp(now), id],
    )?;
    Ok(count > 0)
}

pub fn bookings_for_member(conn: &Connection, member_id: &str) -> anyhow::Result<Vec<Booking>> {
    query_bookings(
        conn,
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE member_id = ?1 ORDER BY start_time DESC"),
        params![member_id],
    )
}

pub fn bookings_for_trainer(conn: &Connection, trainer_id: &str) -> anyhow::Result<Vec<Booking>> {
    query_bookings(
        conn,
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE trainer_id = ?1 ORDER BY start_time DESC"),
        params![trainer_id],
    )
}

/// A member's bookings starting in `[start, end)`, in storage order.
pub fn bookings_for_member_between(
    conn: &Connection,
    member_id: &str,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> anyhow::Result<Vec<Booking>> {
    query_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE member_id = ?1 AND start_time >= ?2 AND start_time < ?3
             ORDER BY rowid ASC"
        ),
        params![member_id, format_timestamp(start), format_timestamp(end)],
    )
}

/// Start times of every approved booking starting in `[start, end)`.
pub fn approved_starts_between(
    conn: &Connection,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> anyhow::Result<Vec<DateTime<Utc>>> {
    let mut stmt = conn.prepare(
        "SELECT start_time FROM bookings
         WHERE status = 'approved' AND start_time >= ?1 AND start_time < ?2
         ORDER BY start_time ASC",
    )?;
    let rows = stmt.query_map(
        params![format_timestamp(start), format_timestamp(end)],
        |row| row.get::<_, String>(0),
    )?;

    let mut starts = vec![];
    for row in rows {
        starts.push(parse_timestamp(&row?)?);
    }
    Ok(starts)
}

pub fn next_approved_for_member(
    conn: &Connection,
    member_id: &str,
    from: &DateTime<Utc>,
) -> anyhow::Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE member_id = ?1 AND status = 'approved' AND start_time >= ?2
                 ORDER BY start_time ASC LIMIT 1"
            ),
            params![member_id, format_timestamp(from)],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;
    booking.transpose()
}

/// Whether an approved booking on the same resource overlaps `[start, end)`.
/// A `None` trainer is the shared self-practice resource.
pub fn approved_overlap_exists(
    conn: &Connection,
    trainer_id: Option<&str>,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    excluding_id: Option<&str>,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE status = 'approved'
           AND COALESCE(trainer_id, '') = COALESCE(?1, '')
           AND start_time < ?3 AND end_time > ?2
           AND id != COALESCE(?4, '')",
        params![
            trainer_id,
            format_timestamp(start),
            format_timestamp(end),
            excluding_id,
        ],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn query_bookings(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let start_time_str: String = row.get(3)?;
    let end_time_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking status in storage: {status_str}"))?;

    Ok(Booking {
        id: row.get(0)?,
        member_id: row.get(1)?,
        trainer_id: row.get(2)?,
        start_time: parse_timestamp(&start_time_str)?,
        end_time: parse_timestamp(&end_time_str)?,
        status,
        notes: row.get(6)?,
        created_at: parse_timestamp(&created_at_str)?,
        updated_at: parse_timestamp(&updated_at_str)?,
    })
}
