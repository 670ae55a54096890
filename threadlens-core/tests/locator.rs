use pretty_assertions::assert_eq;
use proptest::prelude::*;

use threadlens_core::locator::{
    extract_reference, find_reference, is_likely_valid, normalize, sanitize, score_candidate,
    select_best_mapping_reference, TextRegion,
};
use threadlens_core::types::ReferenceKind;

#[test]
fn extracts_bare_markdown_and_wrapped_urls() {
    assert_eq!(
        extract_reference(
            "Summary\nagentexport-mapping: https://agentexports.com/gm/abc123\nthanks",
            ReferenceKind::Mapping
        )
        .as_deref(),
        Some("https://agentexports.com/gm/abc123")
    );
    assert_eq!(
        extract_reference(
            "AgentExport-Mapping: [mapping](https://agentexports.com/gm/abc123)",
            ReferenceKind::Mapping
        )
        .as_deref(),
        Some("https://agentexports.com/gm/abc123")
    );
    assert_eq!(
        extract_reference(
            "agentexport-mapping:   <https://agentexports.com/blob/x1#k3y>.",
            ReferenceKind::Mapping
        )
        .as_deref(),
        Some("https://agentexports.com/blob/x1#k3y")
    );
    assert_eq!(
        extract_reference("agentexport-mapping: not a url", ReferenceKind::Mapping),
        None
    );
    assert_eq!(
        extract_reference(
            "agentexport-mapping: https://agentexports.com/gm/abc",
            ReferenceKind::Proxy
        ),
        None
    );
}

#[test]
fn sanitize_rejects_legacy_single_segment() {
    assert_eq!(sanitize("https://agentexports.com/g/abc123"), None);
    assert_eq!(sanitize("ftp://agentexports.com/gm/abc123"), None);
    assert_eq!(sanitize("not a url"), None);
}

#[test]
fn sanitize_rewrites_near_miss_hosts() {
    for host in ["agentexport.com", "www.agentexports.com", "agentexports.net"] {
        assert_eq!(
            sanitize(&format!("https://{host}/gm/abc123")).as_deref(),
            Some("https://agentexports.com/gm/abc123"),
            "{host}"
        );
    }
}

#[test]
fn normalize_rewrites_legacy_prefixes() {
    assert_eq!(
        normalize("https://agentexports.com/v/abc#key"),
        "https://agentexports.com/blob/abc#key"
    );
    // Without a key the viewer path is left alone.
    assert_eq!(
        normalize("https://agentexports.com/v/abc"),
        "https://agentexports.com/v/abc"
    );
    assert_eq!(
        normalize("https://agentexports.com/g/abc"),
        "https://agentexports.com/gm/abc"
    );
    assert_eq!(normalize("  not a url "), "not a url");
}

fn reference_url() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["v", "g", "gm", "blob", "files"]),
        "[a-zA-Z0-9_-]{1,12}",
        prop::option::of("[a-zA-Z0-9_-]{0,16}"),
        prop::sample::select(vec!["agentexports.com", "127.0.0.1:8787", "gist.github.com"]),
    )
        .prop_map(|(prefix, id, key, host)| match key {
            Some(key) => format!("https://{host}/{prefix}/{id}#{key}"),
            None => format!("https://{host}/{prefix}/{id}"),
        })
}

proptest! {
    #[test]
    fn normalize_is_idempotent(url in reference_url()) {
        let once = normalize(&url);
        prop_assert_eq!(normalize(&once), once);
    }
}

#[test]
fn marker_value_must_be_on_the_marker_line() {
    assert_eq!(
        extract_reference(
            "agentexport-mapping:\nhttps://agentexports.com/gm/abc",
            ReferenceKind::Mapping
        ),
        None
    );
    assert_eq!(
        extract_reference(
            "agentexport-mapping:   \n\nhttps://agentexports.com/gm/abc",
            ReferenceKind::Mapping
        ),
        None
    );
    assert_eq!(
        extract_reference(
            "agentexport-mapping\t:\thttps://agentexports.com/gm/abc",
            ReferenceKind::Mapping
        )
        .as_deref(),
        Some("https://agentexports.com/gm/abc")
    );

    let region = TextRegion::plain("agentexport-proxy:\nhttps://proxy.example.com/fetch");
    assert_eq!(find_reference(&[region], ReferenceKind::Proxy), None);
}

#[test]
fn gm_candidate_outscores_json_only_candidate() {
    let gm = "https://agentexports.com/gm/abc123";
    let json = "https://cdn.example.com/exports/mapping.json";
    assert!(score_candidate(gm) > score_candidate(json));

    let region = TextRegion {
        text: format!("agentexport-mapping: {json}\nalso {gm}"),
        links: Vec::new(),
    };
    assert_eq!(
        select_best_mapping_reference(&[region]).as_deref(),
        Some(gm)
    );
}

#[test]
fn hyperlinks_compete_with_inline_urls() {
    let region = TextRegion {
        text: "agentexport-mapping: see viewer https://agentexports.com/v/abc".to_owned(),
        links: vec!["https://agentexports.com/gm/abc".to_owned()],
    };
    assert_eq!(
        select_best_mapping_reference(&[region]).as_deref(),
        Some("https://agentexports.com/gm/abc")
    );
}

#[test]
fn regions_without_the_marker_are_ignored() {
    let region = TextRegion::plain("https://agentexports.com/gm/abc");
    assert_eq!(select_best_mapping_reference(&[region]), None);
}

#[test]
fn only_legacy_candidates_yield_nothing() {
    let region = TextRegion::plain("agentexport-mapping: https://agentexports.com/g/abc");
    assert_eq!(find_reference(&[region], ReferenceKind::Mapping), None);
}

#[test]
fn proxy_reference_keeps_only_the_origin() {
    let region = TextRegion::plain("agentexport-proxy: https://proxy.example.com:8443/fetch?via=x");
    assert_eq!(
        find_reference(&[region], ReferenceKind::Proxy).as_deref(),
        Some("https://proxy.example.com:8443")
    );
}

#[test]
fn whitelist_accepts_known_shapes_only() {
    assert!(is_likely_valid("https://agentexports.com/gm/abc123"));
    assert!(is_likely_valid("https://agentexports.com/blob/abc123#key"));
    assert!(!is_likely_valid("https://agentexports.com/blob/abc123"));
    assert!(is_likely_valid("https://agentexports.com/exports/a.json"));
    assert!(!is_likely_valid("http://agentexports.com/gm/abc123"));
    assert!(is_likely_valid("http://127.0.0.1:8787/gm/abc123"));
    assert!(is_likely_valid("http://localhost:8787/blob/abc#key"));
    assert!(is_likely_valid("https://gist.githubusercontent.com/alice/abc/raw"));
    assert!(!is_likely_valid("https://gist.github.com/alice"));
    assert!(is_likely_valid("https://cdn.example.com/mapping.json"));
    assert!(!is_likely_valid("https://cdn.example.com/mapping"));
}
