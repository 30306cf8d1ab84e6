// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Planner integration tests with wiremock.

use quirkdav_caldav::{
    AuthMethod, CalDavClient, CalDavConfig, CalDavError, PropFilter, SearchSpec, ServerFlavor,
    Support,
};
use wiremock::matchers::{any, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, flavor: ServerFlavor) -> CalDavConfig {
    CalDavConfig {
        base_url: server.uri(),
        calendar_home: "/cal/".to_string(),
        auth: AuthMethod::None,
        flavor,
        ..Default::default()
    }
}

fn todo_multistatus(entries: &[(&str, &str)]) -> String {
    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <D:multistatus xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:caldav\">\n",
    );
    for (href, uid) in entries {
        body.push_str(&format!(
            "<D:response>\n\
               <D:href>{href}</D:href>\n\
               <D:propstat>\n\
                 <D:prop>\n\
                   <D:getetag>\"{uid}-v1\"</D:getetag>\n\
                   <C:calendar-data>BEGIN:VCALENDAR\n\
BEGIN:VTODO\n\
UID:{uid}\n\
SUMMARY:Task {uid}\n\
END:VTODO\n\
END:VCALENDAR\n\
</C:calendar-data>\n\
                 </D:prop>\n\
                 <D:status>HTTP/1.1 200 OK</D:status>\n\
               </D:propstat>\n\
             </D:response>\n"
        ));
    }
    body.push_str("</D:multistatus>");
    body
}

const EMPTY_MULTISTATUS: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
    <D:multistatus xmlns:D=\"DAV:\"></D:multistatus>";

#[tokio::test]
#[ignore = "require network"]
async fn pending_todo_union_deduplicates() {
    let server = MockServer::start().await;

    // Fragment A: negated status matches. Returns {a, b}.
    Mock::given(method("REPORT"))
        .and(path("/cal/"))
        .and(body_string_contains("negate-condition"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            todo_multistatus(&[("/cal/a.ics", "a"), ("/cal/b.ics", "b")]),
            "application/xml",
        ))
        .expect(1)
        .mount(&server)
        .await;

    // Fragment C: STATUS equals NEEDS-ACTION. Returns {c}.
    Mock::given(method("REPORT"))
        .and(path("/cal/"))
        .and(body_string_contains("NEEDS-ACTION"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            todo_multistatus(&[("/cal/c.ics", "c")]),
            "application/xml",
        ))
        .expect(1)
        .mount(&server)
        .await;

    // Fragment B: both properties undefined. Returns {b, c}, with a
    // trailing-slash href variant to exercise canonical dedup.
    Mock::given(method("REPORT"))
        .and(path("/cal/"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            todo_multistatus(&[("/cal/b.ics/", "b"), ("/cal/c.ics", "c")]),
            "application/xml",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = CalDavClient::new(config_for(&server, ServerFlavor::Generic)).unwrap();
    let results = client.search(&SearchSpec::todos()).await.expect("search");

    let mut uids: Vec<_> = results
        .iter()
        .map(|o| {
            o.calendar
                .as_ref()
                .and_then(|c| c.first_schedulable())
                .and_then(|c| c.uid())
                .unwrap()
                .to_string()
        })
        .collect();
    uids.sort();
    assert_eq!(uids, ["a", "b", "c"]);
}

#[tokio::test]
#[ignore = "require network"]
async fn substring_downgrade_filters_client_side() {
    let server = MockServer::start().await;

    // Google's endpoint rejects substring text-matches, so the wire query
    // carries no prop-filter and the match happens client-side.
    Mock::given(method("REPORT"))
        .and(path("/cal/"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(
            todo_multistatus(&[
                ("/cal/a.ics", "groceries"),
                ("/cal/b.ics", "standup-notes"),
                ("/cal/c.ics", "dentist"),
            ]),
            "application/xml",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut client =
        CalDavClient::new(config_for(&server, ServerFlavor::GoogleCalendar)).unwrap();
    let spec = SearchSpec::todos()
        .with_completed()
        .with_filter(PropFilter::contains("SUMMARY", "standup"));
    let results = client.search(&spec).await.expect("search");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url.as_str(), "/cal/b.ics");
}

#[tokio::test]
#[ignore = "require network"]
async fn expand_without_range_never_touches_transport() {
    let server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut client = CalDavClient::new(config_for(&server, ServerFlavor::Generic)).unwrap();
    let err = client
        .search(&SearchSpec::events().with_expand())
        .await
        .expect_err("inconsistent spec");
    assert!(matches!(err, CalDavError::Consistency(_)));
}

#[tokio::test]
#[ignore = "require network"]
async fn classless_search_fans_out_when_required() {
    let server = MockServer::start().await;

    Mock::given(method("REPORT"))
        .and(path("/cal/"))
        .and(body_string_contains("VEVENT"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(EMPTY_MULTISTATUS, "application/xml"))
        .expect(1)
        .mount(&server)
        .await;

    // The VTODO branch inherits the pending-only default and decomposes.
    Mock::given(method("REPORT"))
        .and(path("/cal/"))
        .and(body_string_contains("VTODO"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(EMPTY_MULTISTATUS, "application/xml"))
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("REPORT"))
        .and(path("/cal/"))
        .and(body_string_contains("VJOURNAL"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(EMPTY_MULTISTATUS, "application/xml"))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = CalDavClient::new(config_for(&server, ServerFlavor::Zimbra)).unwrap();
    let results = client.search(&SearchSpec::any()).await.expect("search");
    assert!(results.is_empty());
}

#[tokio::test]
#[ignore = "require network"]
async fn rejected_server_expansion_downgrades_and_splits_client_side() {
    let server = MockServer::start().await;

    // First REPORT asks for server-side expansion and gets rejected.
    Mock::given(method("REPORT"))
        .and(path("/cal/"))
        .and(body_string_contains("C:expand"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    // The retry without the expand element succeeds.
    let yearly = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
        <D:multistatus xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:caldav\">\n\
        <D:response>\n\
          <D:href>/cal/yearly.ics</D:href>\n\
          <D:propstat>\n\
            <D:prop>\n\
              <D:getetag>\"y-1\"</D:getetag>\n\
              <C:calendar-data>BEGIN:VCALENDAR\n\
BEGIN:VEVENT\n\
UID:yearly-1\n\
DTSTART:20240104T090000Z\n\
RRULE:FREQ=YEARLY\n\
SUMMARY:Annual review\n\
END:VEVENT\n\
END:VCALENDAR\n\
</C:calendar-data>\n\
            </D:prop>\n\
            <D:status>HTTP/1.1 200 OK</D:status>\n\
          </D:propstat>\n\
        </D:response>\n\
        </D:multistatus>";
    Mock::given(method("REPORT"))
        .and(path("/cal/"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(yearly, "application/xml"))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = CalDavClient::new(config_for(&server, ServerFlavor::Generic)).unwrap();
    let spec = SearchSpec::events()
        .with_range(
            "2024-01-01T00:00:00Z".parse().unwrap(),
            "2027-01-01T00:00:00Z".parse().unwrap(),
        )
        .with_server_expand();
    let results = client.search(&spec).await.expect("search");

    assert_eq!(results.len(), 3);
    for obj in &results {
        assert_eq!(obj.url.as_str(), "/cal/yearly.ics");
        let data = obj.data.as_deref().unwrap();
        assert!(data.contains("RECURRENCE-ID:"));
        assert!(!data.contains("RRULE"));
    }
    assert_eq!(
        client
            .capabilities()
            .support_for("search.recurrences.expanded"),
        Support::Unsupported
    );
}

#[tokio::test]
#[ignore = "require network"]
async fn etag_only_results_are_hydrated_and_failures_dropped() {
    let server = MockServer::start().await;

    let etag_only = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
        <D:multistatus xmlns:D=\"DAV:\">\n\
        <D:response>\n\
          <D:href>/cal/ok.ics</D:href>\n\
          <D:propstat>\n\
            <D:prop><D:getetag>\"ok-1\"</D:getetag></D:prop>\n\
            <D:status>HTTP/1.1 200 OK</D:status>\n\
          </D:propstat>\n\
        </D:response>\n\
        <D:response>\n\
          <D:href>/cal/gone.ics</D:href>\n\
          <D:propstat>\n\
            <D:prop><D:getetag>\"gone-1\"</D:getetag></D:prop>\n\
            <D:status>HTTP/1.1 200 OK</D:status>\n\
          </D:propstat>\n\
        </D:response>\n\
        </D:multistatus>";
    Mock::given(method("REPORT"))
        .and(path("/cal/"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(etag_only, "application/xml"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cal/ok.ics"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:ok\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
            "text/calendar",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cal/gone.ics"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = CalDavClient::new(config_for(&server, ServerFlavor::Generic)).unwrap();
    let results = client.search(&SearchSpec::events()).await.expect("search");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url.as_str(), "/cal/ok.ics");
    assert!(results[0].loaded);
}
