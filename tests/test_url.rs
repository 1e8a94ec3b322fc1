use tether::http::parser::{ParseError, parse_url};
use tether::http::url::{FieldData, RequestUrl, UrlField, UrlFieldTable};

fn request_url(target: &str, is_connect: bool) -> RequestUrl {
    let table = parse_url(target.as_bytes(), is_connect).unwrap();
    RequestUrl::from_fields(target.as_bytes(), &table)
}

#[test]
fn test_origin_form_has_only_path_and_query() {
    let url = request_url("/a?b=1", false);

    assert_eq!(url.path.as_deref(), Some("/a"));
    assert_eq!(url.query.as_deref(), Some("b=1"));
    assert_eq!(url.scheme, None);
    assert_eq!(url.host, None);
    assert_eq!(url.port, None);
    assert_eq!(url.user_info, None);
    assert_eq!(url.fragment, None);
}

#[test]
fn test_absolute_form_components() {
    let url = request_url("http://user:pw@example.com:8080/x/y?q=2#frag", false);

    assert_eq!(url.scheme.as_deref(), Some("http"));
    assert_eq!(url.user_info.as_deref(), Some("user:pw"));
    assert_eq!(url.host.as_deref(), Some("example.com"));
    assert_eq!(url.port, Some(8080));
    assert_eq!(url.path.as_deref(), Some("/x/y"));
    assert_eq!(url.query.as_deref(), Some("q=2"));
    assert_eq!(url.fragment.as_deref(), Some("frag"));
}

#[test]
fn test_absolute_form_without_path() {
    let url = request_url("https://example.com", false);

    assert_eq!(url.host.as_deref(), Some("example.com"));
    assert_eq!(url.path, None);
    assert_eq!(url.path(), "");
}

#[test]
fn test_ipv6_host_loses_brackets() {
    let url = request_url("http://[::1]:3000/", false);

    assert_eq!(url.host.as_deref(), Some("::1"));
    assert_eq!(url.port, Some(3000));
    assert_eq!(url.to_string(), "http://[::1]:3000/");
}

#[test]
fn test_connect_authority_form() {
    let url = request_url("example.com:443", true);

    assert_eq!(url.host.as_deref(), Some("example.com"));
    assert_eq!(url.port, Some(443));
    assert_eq!(url.path, None);
}

#[test]
fn test_connect_requires_port() {
    assert_eq!(parse_url(b"example.com", true), Err(ParseError::InvalidUrl));
    assert_eq!(parse_url(b"me@example.com:443", true), Err(ParseError::InvalidUrl));
}

#[test]
fn test_asterisk_form() {
    let url = request_url("*", false);
    assert_eq!(url.path.as_deref(), Some("*"));
}

#[test]
fn test_invalid_targets() {
    for target in [
        &b""[..],
        b"http:/x",
        b"1http://a/",
        b"http://:80/",
        b"http://host:99999/",
        b"http://host:8x/",
        b"/with space",
    ] {
        assert_eq!(
            parse_url(target, false),
            Err(ParseError::InvalidUrl),
            "{}",
            String::from_utf8_lossy(target)
        );
    }
}

#[test]
fn test_port_comes_from_decoded_value() {
    let data = b"http://h:0080/";
    let mut table = UrlFieldTable::new();
    table.set(UrlField::Scheme, 0, 4);
    table.set(UrlField::Host, 7, 1);
    table.set_port(9, 4, 80);
    table.set(UrlField::Path, 13, 1);

    let url = RequestUrl::from_fields(data, &table);
    assert_eq!(url.port, Some(80));
    assert_eq!(table.get(UrlField::Port), Some(FieldData { off: 9, len: 4 }));
}

#[test]
fn test_absent_fields_are_none() {
    let table = UrlFieldTable::new();
    for field in UrlField::ALL {
        assert!(!table.has(field));
        assert_eq!(table.get(field), None);
    }
    assert_eq!(RequestUrl::from_fields(b"/ignored", &table), RequestUrl::default());
}

#[test]
fn test_query_pairs_are_decoded() {
    let url = request_url("/search?q=rust+lang&page=2&tag=a%26b", false);

    assert_eq!(
        url.query_pairs(),
        vec![
            ("q".to_string(), "rust lang".to_string()),
            ("page".to_string(), "2".to_string()),
            ("tag".to_string(), "a&b".to_string()),
        ]
    );
    assert!(request_url("/plain", false).query_pairs().is_empty());
}

#[test]
fn test_to_url_needs_absolute_form() {
    assert!(request_url("/a?b=1", false).to_url().is_none());

    let url = request_url("http://example.com:8080/a?b=1", false).to_url().unwrap();
    assert_eq!(url.host_str(), Some("example.com"));
    assert_eq!(url.port(), Some(8080));
    assert_eq!(url.path(), "/a");
    assert_eq!(url.query(), Some("b=1"));
}

#[test]
fn test_display_reassembles_target() {
    let target = "http://user@example.com:8080/x?y=1#z";
    assert_eq!(request_url(target, false).to_string(), target);
    assert_eq!(request_url("/a?b=1", false).to_string(), "/a?b=1");
}
