//! Request-target reconstruction.
//!
//! The parser splits the raw request target into a [`UrlFieldTable`]: a
//! presence bit plus an offset/length pair for each component it found.
//! [`RequestUrl::from_fields`] turns that table back into a structured value
//! without re-parsing anything.

use std::fmt;

/// Components a request target can be split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlField {
    Scheme,
    Host,
    Port,
    Path,
    Query,
    Fragment,
    UserInfo,
}

impl UrlField {
    pub const ALL: [UrlField; 7] = [
        UrlField::Scheme,
        UrlField::Host,
        UrlField::Port,
        UrlField::Path,
        UrlField::Query,
        UrlField::Fragment,
        UrlField::UserInfo,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Byte range of one component inside the raw target buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldData {
    pub off: usize,
    pub len: usize,
}

/// Field-presence table produced by [`parse_url`](crate::http::parser::parse_url).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlFieldTable {
    field_set: u16,
    field_data: [FieldData; 7],
    port: u16,
}

impl UrlFieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `field` as present at `off..off + len`.
    pub fn set(&mut self, field: UrlField, off: usize, len: usize) {
        self.field_set |= 1 << field.index();
        self.field_data[field.index()] = FieldData { off, len };
    }

    /// Records the already-decoded port number alongside its text range.
    pub fn set_port(&mut self, off: usize, len: usize, port: u16) {
        self.set(UrlField::Port, off, len);
        self.port = port;
    }

    pub fn has(&self, field: UrlField) -> bool {
        self.field_set & (1 << field.index()) != 0
    }

    pub fn get(&self, field: UrlField) -> Option<FieldData> {
        self.has(field).then(|| self.field_data[field.index()])
    }

    /// The decoded port. Only meaningful when [`UrlField::Port`] is present.
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// A request target split into its components.
///
/// Every component is `None` unless the parser reported it present. Nothing
/// is defaulted: an origin-form target like `/a?b=1` has no scheme or host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestUrl {
    pub scheme: Option<String>,
    pub user_info: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl RequestUrl {
    /// Assembles a URL from the raw target bytes and the parser's field table.
    ///
    /// The port is taken from the table's decoded integer, never from the
    /// text range. A range that falls outside `data` is treated as absent.
    pub fn from_fields(data: &[u8], table: &UrlFieldTable) -> Self {
        let text = |field: UrlField| {
            table.get(field).and_then(|FieldData { off, len }| {
                data.get(off..off.checked_add(len)?).map(latin1)
            })
        };

        Self {
            scheme: text(UrlField::Scheme),
            user_info: text(UrlField::UserInfo),
            host: text(UrlField::Host),
            port: table.has(UrlField::Port).then(|| table.port()),
            path: text(UrlField::Path),
            query: text(UrlField::Query),
            fragment: text(UrlField::Fragment),
        }
    }

    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or("")
    }

    /// Decodes the query string as `application/x-www-form-urlencoded` pairs.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Converts an absolute-form target into a [`url::Url`].
    ///
    /// Returns `None` for origin-form targets, which carry no scheme or host.
    pub fn to_url(&self) -> Option<url::Url> {
        if self.scheme.is_none() || self.host.is_none() {
            return None;
        }
        url::Url::parse(&self.to_string()).ok()
    }
}

impl fmt::Display for RequestUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{scheme}:")?;
        }
        if self.host.is_some() {
            f.write_str("//")?;
            if let Some(user_info) = &self.user_info {
                write!(f, "{user_info}@")?;
            }
            if let Some(host) = &self.host {
                if host.contains(':') {
                    write!(f, "[{host}]")?;
                } else {
                    f.write_str(host)?;
                }
            }
            if let Some(port) = self.port {
                write!(f, ":{port}")?;
            }
        }
        f.write_str(self.path())?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
