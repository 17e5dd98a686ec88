//! Text rendering of PostgreSQL values received in binary format
//!
//! Prepared statements always return binary results, so every built-in type
//! is decoded here from its wire layout. Arrays, records and ranges recurse
//! into their element types. Enum labels travel as plain text.
//!
//! A type with no decoder is shown as its bytes when they are printable
//! UTF-8 and as `0x` hex otherwise, so no column type can fail a query.

use std::fmt::Write;
use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::DateTime;
use sqlx::postgres::{PgTypeInfo, PgTypeKind};
use sqlx::TypeInfo;

use super::{float_text, hex_string};

/// Microseconds between the Unix epoch and PostgreSQL's 2000-01-01 epoch
const PG_EPOCH_MICROS: i64 = 946_684_800_000_000;
const MICROS_PER_DAY: i64 = 86_400_000_000;
const DAYS_UNIX_TO_PG: i64 = 10_957;

/// Render one non-null value of type `ty`
pub(super) fn render(ty: &PgTypeInfo, bytes: &[u8]) -> Result<String, String> {
    match ty.kind() {
        PgTypeKind::Enum(_) => utf8(bytes),
        PgTypeKind::Domain(base) => render(base, bytes),
        PgTypeKind::Array(element) => render_array(bytes, &|b| render(element, b)),
        PgTypeKind::Range(element) => render_range(bytes, &|b| render(element, b)),
        PgTypeKind::Composite(fields) => render_record(bytes, &|index, oid, b| {
            match fields.get(index) {
                Some((_, field)) => render(field, b),
                None => render_builtin(builtin_name(oid), b),
            }
        }),
        _ => render_builtin(ty.name(), bytes),
    }
}

fn render_builtin(name: &str, bytes: &[u8]) -> Result<String, String> {
    Ok(match name {
        "BOOL" => match fixed::<1>(bytes)?[0] {
            0 => "false".to_string(),
            _ => "true".to_string(),
        },
        "INT2" => i16::from_be_bytes(fixed(bytes)?).to_string(),
        "INT4" => i32::from_be_bytes(fixed(bytes)?).to_string(),
        "INT8" => i64::from_be_bytes(fixed(bytes)?).to_string(),
        "OID" => u32::from_be_bytes(fixed(bytes)?).to_string(),
        "FLOAT4" => {
            let value = f32::from_be_bytes(fixed(bytes)?);
            if value.is_finite() {
                value.to_string()
            } else {
                float_text(f64::from(value))
            }
        }
        "FLOAT8" => float_text(f64::from_be_bytes(fixed(bytes)?)),
        "NUMERIC" => decode_numeric(bytes)?,
        "MONEY" => money_text(i64::from_be_bytes(fixed(bytes)?)),
        "BYTEA" => hex_string(bytes),
        "UUID" => uuid::Uuid::from_bytes(fixed(bytes)?).to_string(),
        "DATE" => date_text(i32::from_be_bytes(fixed(bytes)?))?,
        "TIME" => time_text(u64::try_from(i64::from_be_bytes(fixed(bytes)?)).map_err(|e| e.to_string())?),
        "TIMETZ" => {
            let mut reader = Reader::new(bytes);
            let micros = u64::try_from(reader.i64()?).map_err(|e| e.to_string())?;
            // Stored as seconds west of UTC
            let zone = reader.i32()?;
            format!("{}{}", time_text(micros), offset_text(-zone))
        }
        "TIMESTAMP" => timestamp_text(i64::from_be_bytes(fixed(bytes)?))?,
        "TIMESTAMPTZ" => timestamptz_text(i64::from_be_bytes(fixed(bytes)?))?,
        "INTERVAL" => {
            let mut reader = Reader::new(bytes);
            let micros = reader.i64()?;
            let days = reader.i32()?;
            let months = reader.i32()?;
            interval_text(months, days, micros)
        }
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "JSON" | "XML" | "UNKNOWN" => utf8(bytes)?,
        "JSONB" | "JSONPATH" => match bytes.split_first() {
            Some((1, text)) => utf8(text)?,
            Some((version, _)) => return Err(format!("unsupported {} version {}", name, version)),
            None => return Err(format!("empty {} value", name)),
        },
        "INET" => inet_text(bytes, false)?,
        "CIDR" => inet_text(bytes, true)?,
        "MACADDR" | "MACADDR8" => bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":"),
        "BIT" | "VARBIT" => bits_text(bytes)?,
        "POINT" => point_text(&mut Reader::new(bytes))?,
        "LSEG" => {
            let mut reader = Reader::new(bytes);
            format!("[{},{}]", point_text(&mut reader)?, point_text(&mut reader)?)
        }
        "BOX" => {
            let mut reader = Reader::new(bytes);
            format!("{},{}", point_text(&mut reader)?, point_text(&mut reader)?)
        }
        "CIRCLE" => {
            let mut reader = Reader::new(bytes);
            let center = point_text(&mut reader)?;
            format!("<{},{}>", center, float_text(reader.f64()?))
        }
        "LINE" => {
            let mut reader = Reader::new(bytes);
            let (a, b, c) = (reader.f64()?, reader.f64()?, reader.f64()?);
            format!("{{{},{},{}}}", float_text(a), float_text(b), float_text(c))
        }
        "PATH" => {
            let mut reader = Reader::new(bytes);
            let closed = reader.u8()? != 0;
            let points = points_text(&mut reader)?;
            if closed {
                format!("({})", points)
            } else {
                format!("[{}]", points)
            }
        }
        "POLYGON" => format!("({})", points_text(&mut Reader::new(bytes))?),
        "RECORD" => render_record(bytes, &|_, oid, b| render_builtin(builtin_name(oid), b))?,
        "VOID" => String::new(),
        _ => printable_or_hex(bytes),
    })
}

/// Built-in type names for the OIDs an anonymous record may carry
fn builtin_name(oid: u32) -> &'static str {
    match oid {
        16 => "BOOL",
        17 => "BYTEA",
        19 => "NAME",
        20 => "INT8",
        21 => "INT2",
        23 => "INT4",
        25 => "TEXT",
        26 => "OID",
        114 => "JSON",
        142 => "XML",
        600 => "POINT",
        650 => "CIDR",
        700 => "FLOAT4",
        701 => "FLOAT8",
        790 => "MONEY",
        829 => "MACADDR",
        869 => "INET",
        1042 => "BPCHAR",
        1043 => "VARCHAR",
        1082 => "DATE",
        1083 => "TIME",
        1114 => "TIMESTAMP",
        1184 => "TIMESTAMPTZ",
        1186 => "INTERVAL",
        1266 => "TIMETZ",
        1560 => "BIT",
        1562 => "VARBIT",
        1700 => "NUMERIC",
        2249 => "RECORD",
        2950 => "UUID",
        3802 => "JSONB",
        _ => "",
    }
}

// ============================================================================
// Containers
// ============================================================================

type ElementFn<'a> = &'a dyn Fn(&[u8]) -> Result<String, String>;

/// `{1,2,NULL}`, nested per dimension; non-default lower bounds are prefixed
/// as `[0:1]=`
fn render_array(bytes: &[u8], element: ElementFn<'_>) -> Result<String, String> {
    let mut reader = Reader::new(bytes);
    let ndim = reader.i32()?;
    let _has_nulls = reader.i32()?;
    let _element_oid = reader.u32()?;
    if ndim <= 0 {
        return Ok("{}".to_string());
    }

    let mut dims = Vec::with_capacity(ndim as usize);
    for _ in 0..ndim {
        let len = reader.i32()?;
        let lower = reader.i32()?;
        let len = usize::try_from(len).map_err(|_| format!("negative array length {}", len))?;
        dims.push((len, lower));
    }

    let mut out = String::new();
    if dims.iter().any(|&(_, lower)| lower != 1) {
        for &(len, lower) in &dims {
            let _ = write!(out, "[{}:{}]", lower, i64::from(lower) + len as i64 - 1);
        }
        out.push('=');
    }
    write_array_level(&mut out, &mut reader, &dims, element)?;
    Ok(out)
}

fn write_array_level(
    out: &mut String,
    reader: &mut Reader<'_>,
    dims: &[(usize, i32)],
    element: ElementFn<'_>,
) -> Result<(), String> {
    let Some((&(len, _), inner)) = dims.split_first() else {
        return Ok(());
    };

    out.push('{');
    for index in 0..len {
        if index > 0 {
            out.push(',');
        }
        if !inner.is_empty() {
            write_array_level(out, reader, inner, element)?;
            continue;
        }
        match reader.field()? {
            None => out.push_str("NULL"),
            Some(bytes) => {
                let text = element(bytes)?;
                let needs_quotes = text.is_empty()
                    || text.eq_ignore_ascii_case("NULL")
                    || text
                        .chars()
                        .any(|c| matches!(c, '{' | '}' | ',' | '"' | '\\') || c.is_ascii_whitespace());
                push_quoted(out, &text, needs_quotes, '\\');
            }
        }
    }
    out.push('}');
    Ok(())
}

type FieldFn<'a> = &'a dyn Fn(usize, u32, &[u8]) -> Result<String, String>;

/// `(1,abc,)` with NULL fields left empty
fn render_record(bytes: &[u8], field: FieldFn<'_>) -> Result<String, String> {
    let mut reader = Reader::new(bytes);
    let count = reader.i32()?;

    let mut out = String::from("(");
    for index in 0..usize::try_from(count).unwrap_or(0) {
        if index > 0 {
            out.push(',');
        }
        let oid = reader.u32()?;
        if let Some(value) = reader.field()? {
            let text = field(index, oid, value)?;
            let needs_quotes = text.is_empty()
                || text
                    .chars()
                    .any(|c| matches!(c, '(' | ')' | ',' | '"' | '\\') || c.is_ascii_whitespace());
            push_quoted(&mut out, &text, needs_quotes, '"');
        }
    }
    out.push(')');
    Ok(out)
}

const RANGE_EMPTY: u8 = 0x01;
const RANGE_LB_INC: u8 = 0x02;
const RANGE_UB_INC: u8 = 0x04;
const RANGE_LB_INF: u8 = 0x08;
const RANGE_UB_INF: u8 = 0x10;

/// `[1,5)`, `(,3]` or `empty`
fn render_range(bytes: &[u8], element: ElementFn<'_>) -> Result<String, String> {
    let mut reader = Reader::new(bytes);
    let flags = reader.u8()?;
    if flags & RANGE_EMPTY != 0 {
        return Ok("empty".to_string());
    }

    let mut out = String::new();
    out.push(if flags & RANGE_LB_INC != 0 { '[' } else { '(' });
    if flags & RANGE_LB_INF == 0 {
        push_range_bound(&mut out, &mut reader, element)?;
    }
    out.push(',');
    if flags & RANGE_UB_INF == 0 {
        push_range_bound(&mut out, &mut reader, element)?;
    }
    out.push(if flags & RANGE_UB_INC != 0 { ']' } else { ')' });
    Ok(out)
}

fn push_range_bound(
    out: &mut String,
    reader: &mut Reader<'_>,
    element: ElementFn<'_>,
) -> Result<(), String> {
    let bytes = reader
        .field()?
        .ok_or_else(|| "range bound is NULL".to_string())?;
    let text = element(bytes)?;
    let needs_quotes = text.is_empty()
        || text
            .chars()
            .any(|c| matches!(c, '(' | ')' | '[' | ']' | ',' | '"' | '\\') || c.is_ascii_whitespace());
    push_quoted(out, &text, needs_quotes, '"');
    Ok(())
}

/// Wrap `text` in double quotes when needed. Arrays escape `"` and `\` with
/// a backslash; records and ranges double them.
fn push_quoted(out: &mut String, text: &str, needs_quotes: bool, escape: char) {
    if !needs_quotes {
        out.push_str(text);
        return;
    }
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push(if escape == '\\' { '\\' } else { c });
        }
        out.push(c);
    }
    out.push('"');
}

// ============================================================================
// Scalars
// ============================================================================

fn utf8(bytes: &[u8]) -> Result<String, String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| e.to_string())
}

fn printable_or_hex(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text)
            if !text
                .chars()
                .any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r')) =>
        {
            text.to_string()
        }
        _ => hex_string(bytes),
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], String> {
    <[u8; N]>::try_from(bytes).map_err(|_| format!("expected {} bytes, got {}", N, bytes.len()))
}

/// Amount in the smallest currency unit, shown with two decimals
fn money_text(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

fn date_text(days: i32) -> Result<String, String> {
    match days {
        i32::MAX => return Ok("infinity".to_string()),
        i32::MIN => return Ok("-infinity".to_string()),
        _ => {}
    }
    let secs = (i64::from(days) + DAYS_UNIX_TO_PG) * 86_400;
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.date_naive().to_string())
        .ok_or_else(|| format!("date out of range: {} days", days))
}

/// `HH:MM:SS` with fractional seconds only when non-zero
fn time_text(micros: u64) -> String {
    let hours = micros / 3_600_000_000;
    let minutes = micros / 60_000_000 % 60;
    let seconds = micros / 1_000_000 % 60;
    let fraction = micros % 1_000_000;

    let mut out = format!("{:02}:{:02}:{:02}", hours, minutes, seconds);
    if fraction > 0 {
        let digits = format!("{:06}", fraction);
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out
}

/// `+02`, `-05:30`, `+00:00:30`
fn offset_text(east_seconds: i32) -> String {
    let sign = if east_seconds < 0 { '-' } else { '+' };
    let abs = east_seconds.unsigned_abs();
    let mut out = format!("{}{:02}", sign, abs / 3600);
    if abs % 3600 != 0 {
        let _ = write!(out, ":{:02}", abs % 3600 / 60);
        if abs % 60 != 0 {
            let _ = write!(out, ":{:02}", abs % 60);
        }
    }
    out
}

fn timestamp_text(micros: i64) -> Result<String, String> {
    match micros {
        i64::MAX => return Ok("infinity".to_string()),
        i64::MIN => return Ok("-infinity".to_string()),
        _ => {}
    }
    let unix = micros
        .checked_add(PG_EPOCH_MICROS)
        .ok_or_else(|| format!("timestamp out of range: {}", micros))?;
    let date = DateTime::from_timestamp(unix.div_euclid(MICROS_PER_DAY) * 86_400, 0)
        .ok_or_else(|| format!("timestamp out of range: {}", micros))?
        .date_naive();
    Ok(format!(
        "{} {}",
        date,
        time_text(unix.rem_euclid(MICROS_PER_DAY) as u64)
    ))
}

fn timestamptz_text(micros: i64) -> Result<String, String> {
    match micros {
        i64::MAX => return Ok("infinity".to_string()),
        i64::MIN => return Ok("-infinity".to_string()),
        _ => {}
    }
    let unix = micros
        .checked_add(PG_EPOCH_MICROS)
        .ok_or_else(|| format!("timestamp out of range: {}", micros))?;
    DateTime::from_timestamp(
        unix.div_euclid(1_000_000),
        (unix.rem_euclid(1_000_000) * 1000) as u32,
    )
    .map(|dt| dt.to_rfc3339())
    .ok_or_else(|| format!("timestamp out of range: {}", micros))
}

/// PostgreSQL's default interval style: `1 year 2 mons -3 days +04:05:06`
fn interval_text(months: i32, days: i32, micros: i64) -> String {
    let mut out = String::new();
    let mut previous_negative = false;

    let parts = [
        (i64::from(months / 12), "year"),
        (i64::from(months % 12), "mon"),
        (i64::from(days), "day"),
    ];
    for (value, unit) in parts {
        if value == 0 {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        if previous_negative && value > 0 {
            out.push('+');
        }
        let _ = write!(out, "{} {}{}", value, unit, if value == 1 { "" } else { "s" });
        previous_negative = value < 0;
    }

    if micros != 0 || out.is_empty() {
        if !out.is_empty() {
            out.push(' ');
        }
        if micros < 0 {
            out.push('-');
        } else if previous_negative {
            out.push('+');
        }
        out.push_str(&time_text(micros.unsigned_abs()));
    }
    out
}

const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

/// `10.0.0.1`, `10.0.0.0/8`; CIDR values always carry the prefix length
fn inet_text(bytes: &[u8], cidr: bool) -> Result<String, String> {
    let mut reader = Reader::new(bytes);
    let family = reader.u8()?;
    let bits = reader.u8()?;
    let _is_cidr = reader.u8()?;
    let len = reader.u8()? as usize;
    let addr = reader.take(len)?;

    let (text, max_bits) = match family {
        PGSQL_AF_INET => (Ipv4Addr::from(fixed::<4>(addr)?).to_string(), 32),
        PGSQL_AF_INET6 => (Ipv6Addr::from(fixed::<16>(addr)?).to_string(), 128),
        other => return Err(format!("unknown address family {}", other)),
    };

    if cidr || bits != max_bits {
        Ok(format!("{}/{}", text, bits))
    } else {
        Ok(text)
    }
}

fn bits_text(bytes: &[u8]) -> Result<String, String> {
    let mut reader = Reader::new(bytes);
    let len = reader.i32()?;
    let len = usize::try_from(len).map_err(|_| format!("negative bit length {}", len))?;
    let data = reader.take(len.div_ceil(8))?;
    Ok((0..len)
        .map(|i| if data[i / 8] & (0x80 >> (i % 8)) != 0 { '1' } else { '0' })
        .collect())
}

fn point_text(reader: &mut Reader<'_>) -> Result<String, String> {
    let x = reader.f64()?;
    let y = reader.f64()?;
    Ok(format!("({},{})", float_text(x), float_text(y)))
}

fn points_text(reader: &mut Reader<'_>) -> Result<String, String> {
    let count = reader.i32()?;
    let mut points = Vec::new();
    for _ in 0..count.max(0) {
        points.push(point_text(reader)?);
    }
    Ok(points.join(","))
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Decode the binary wire form of `NUMERIC` into its canonical text
///
/// Layout: digit count, weight of the first digit, sign, display scale (all
/// 16-bit big-endian) followed by base-10000 digits.
fn decode_numeric(bytes: &[u8]) -> Result<String, String> {
    if bytes.len() < 8 {
        return Err(format!("numeric value is {} bytes, expected at least 8", bytes.len()));
    }
    let word = |at: usize| u16::from_be_bytes([bytes[at], bytes[at + 1]]);

    let ndigits = word(0) as usize;
    let weight = word(2) as i16 as i32;
    let sign = word(4);
    let dscale = word(6) as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        _ => {}
    }

    if bytes.len() < 8 + ndigits * 2 {
        return Err(format!("numeric value declares {} digits but is truncated", ndigits));
    }
    let digits: Vec<u16> = (0..ndigits).map(|k| word(8 + k * 2)).collect();
    let digit_at = |pos: i32| -> u16 {
        usize::try_from(pos)
            .ok()
            .and_then(|p| digits.get(p).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        for pos in 0..=weight {
            let _ = if pos == 0 {
                write!(out, "{}", digit_at(pos))
            } else {
                write!(out, "{:04}", digit_at(pos))
            };
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut pos = weight + 1;
        while fraction.len() < dscale {
            let _ = write!(fraction, "{:04}", digit_at(pos));
            pos += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

/// Big-endian cursor over one value's bytes
struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        if self.bytes.len() < n {
            return Err(format!(
                "value truncated: needed {} more bytes, {} left",
                n,
                self.bytes.len()
            ));
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], String> {
        fixed(self.take(N)?)
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.array::<1>()?[0])
    }

    fn i32(&mut self) -> Result<i32, String> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, String> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, String> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64, String> {
        Ok(f64::from_be_bytes(self.array()?))
    }

    /// Length-prefixed field; length -1 is NULL
    fn field(&mut self) -> Result<Option<&'a [u8]>, String> {
        match self.i32()? {
            -1 => Ok(None),
            len if len < 0 => Err(format!("invalid field length {}", len)),
            len => self.take(len as usize).map(Some),
        }
    }
}
