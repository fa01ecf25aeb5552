//! Snapshot byte format
//!
//! The whole manager state is encoded as one flat little-endian byte stream:
//!
//! ```text
//! capacity_bound : u64
//! user_count     : u64
//! per user       : user_id u32, visit_count u64
//! per visit      : visit_id u32,
//!                  url_len u64, url bytes + NUL,
//!                  text_len u64, text bytes + NUL,
//!                  seconds i64, nanos i64
//! ```
//!
//! String lengths include the trailing NUL. On 64-bit little-endian hosts
//! this matches the native `size_t`/`timespec` layout byte for byte.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::StorageError;
use crate::record::UserRecord;
use crate::visit::{Timestamp, Visit};

const U32_LEN: usize = 4;
const U64_LEN: usize = 8;
/// Fixed part of an encoded visit: id, two length prefixes and the timestamp
const VISIT_FIXED_LEN: usize = U32_LEN + 2 * U64_LEN + 2 * U64_LEN;
/// Smallest possible encoded visit (both strings empty)
const VISIT_MIN_LEN: usize = VISIT_FIXED_LEN + 2;

/// State recovered from a snapshot
#[derive(Debug, Default)]
pub struct DecodedSnapshot {
    /// Capacity bound written by the previous owner; informational only
    pub stored_max_visits: u64,
    /// Records keyed by user id
    pub users: BTreeMap<u32, UserRecord>,
    /// Visits read but dropped because a user exceeded `max_visits`
    pub truncated: usize,
}

/// Encode the full state
pub fn encode<'a, I>(max_visits: usize, records: I) -> Bytes
where
    I: IntoIterator<Item = &'a UserRecord>,
    I::IntoIter: ExactSizeIterator,
{
    let records = records.into_iter();
    let mut buf = BytesMut::with_capacity(2 * U64_LEN);
    buf.put_u64_le(max_visits as u64);
    buf.put_u64_le(records.len() as u64);

    for record in records {
        buf.put_u32_le(record.user_id());
        buf.put_u64_le(record.len() as u64);
        for visit in record.visits() {
            buf.reserve(VISIT_MIN_LEN + visit.url.len() + visit.text.len());
            buf.put_u32_le(visit.visit_id);
            put_terminated(&mut buf, &visit.url);
            put_terminated(&mut buf, &visit.text);
            buf.put_i64_le(visit.timestamp.seconds);
            buf.put_i64_le(i64::from(visit.timestamp.nanos));
        }
    }

    buf.freeze()
}

fn put_terminated(buf: &mut BytesMut, s: &str) {
    buf.put_u64_le(s.len() as u64 + 1);
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

/// Decode a snapshot, keeping at most `max_visits` visits per user
///
/// The stored capacity bound is read and returned but never applied. Visits
/// beyond `max_visits` are dropped in file order, not by recency.
pub fn decode(data: &[u8], max_visits: usize) -> Result<DecodedSnapshot, StorageError> {
    let mut buf = data;
    let stored_max_visits = get_u64(&mut buf, "capacity bound")?;
    let user_count = get_u64(&mut buf, "user count")?;

    let mut snapshot = DecodedSnapshot {
        stored_max_visits,
        ..DecodedSnapshot::default()
    };

    for _ in 0..user_count {
        let user_id = get_u32(&mut buf, "user id")?;
        let visit_count = get_len(&mut buf, "visit count")?;

        // Never reserve more than the remaining bytes could possibly hold.
        let reserve = visit_count
            .min(max_visits)
            .min(buf.remaining() / VISIT_MIN_LEN);
        let mut record = UserRecord::with_capacity(user_id, reserve)?;
        for _ in 0..visit_count {
            let visit = get_visit(&mut buf)?;
            if record.len() >= max_visits {
                snapshot.truncated += 1;
                continue;
            }
            if record.contains(visit.visit_id) {
                return Err(StorageError::deserialization(format!(
                    "visit {} appears twice for user {user_id}",
                    visit.visit_id
                )));
            }
            record.push_unchecked(visit)?;
        }

        if snapshot.users.insert(user_id, record).is_some() {
            return Err(StorageError::deserialization(format!(
                "user {user_id} appears twice"
            )));
        }
    }

    Ok(snapshot)
}

fn get_visit(buf: &mut &[u8]) -> Result<Visit, StorageError> {
    let visit_id = get_u32(buf, "visit id")?;
    let url = get_terminated(buf, "url")?;
    let text = get_terminated(buf, "text")?;
    let seconds = get_i64(buf, "timestamp seconds")?;
    let nanos = get_i64(buf, "timestamp nanos")?;
    let timestamp = u32::try_from(nanos)
        .ok()
        .and_then(|n| Timestamp::new(seconds, n))
        .ok_or_else(|| {
            StorageError::deserialization(format!("visit {visit_id} has invalid nanos {nanos}"))
        })?;
    Ok(Visit {
        visit_id,
        url,
        text,
        timestamp,
    })
}

fn ensure(buf: &[u8], needed: usize, what: &str) -> Result<(), StorageError> {
    if buf.remaining() < needed {
        return Err(StorageError::deserialization(format!(
            "truncated {what}: need {needed} bytes, {} left",
            buf.remaining()
        )));
    }
    Ok(())
}

fn get_u32(buf: &mut &[u8], what: &str) -> Result<u32, StorageError> {
    ensure(buf, U32_LEN, what)?;
    Ok(buf.get_u32_le())
}

fn get_u64(buf: &mut &[u8], what: &str) -> Result<u64, StorageError> {
    ensure(buf, U64_LEN, what)?;
    Ok(buf.get_u64_le())
}

fn get_i64(buf: &mut &[u8], what: &str) -> Result<i64, StorageError> {
    ensure(buf, U64_LEN, what)?;
    Ok(buf.get_i64_le())
}

fn get_len(buf: &mut &[u8], what: &str) -> Result<usize, StorageError> {
    let raw = get_u64(buf, what)?;
    usize::try_from(raw)
        .map_err(|_| StorageError::deserialization(format!("{what} {raw} does not fit in memory")))
}

fn get_terminated(buf: &mut &[u8], what: &str) -> Result<String, StorageError> {
    let len = get_len(buf, what)?;
    if len == 0 {
        return Err(StorageError::deserialization(format!(
            "{what} length must include the terminator"
        )));
    }
    ensure(buf, len, what)?;

    let data = *buf;
    let (raw, rest) = data.split_at(len);
    *buf = rest;
    let Some((&0, body)) = raw.split_last() else {
        return Err(StorageError::deserialization(format!(
            "{what} is not NUL-terminated"
        )));
    };
    if body.contains(&0) {
        return Err(StorageError::deserialization(format!(
            "{what} contains an interior NUL"
        )));
    }
    String::from_utf8(body.to_vec())
        .map_err(|e| StorageError::deserialization(format!("{what} is not UTF-8: {e}")))
}
