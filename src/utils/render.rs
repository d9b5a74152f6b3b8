use crate::types::pin::{Pin, is_valid_home_page};
use crate::utils::encode::{decode_api_html, encode_api_html};

const DATE_FORMAT: &str = "%A, %B %-d, %Y at %H:%M %Z";

/// Default marker popup body for a pin.
pub fn render_popup(pin: &Pin) -> String {
    let mut html = String::new();

    html.push_str(&format!("<p><strong>{}</strong>", encode_api_html(&pin.title)));
    if let Some(owner) = &pin.owner {
        html.push_str(&format!(" - by {}", encode_api_html(owner)));
    }
    html.push_str("</p>");

    match pin.date {
        Some(date) => {
            html.push_str(&format!(
                "<p><strong>Scheduled for:</strong> {}</p>",
                date.format(DATE_FORMAT)
            ));

            if let Some(days) = pin.recurs_every_days {
                let unit = if days == 1 { "day" } else { "days" };
                html.push_str(&format!("<p><strong>Repeats every</strong> {} {}</p>", days, unit));
            }
        }
        None => html.push_str("<p><strong>Ongoing location</strong></p>"),
    }

    if let Some(dress_code) = &pin.dress_code {
        html.push_str(&format!(
            "<p><strong>Dress Code:</strong> {}</p>",
            encode_api_html(dress_code)
        ));
    }

    html.push_str(&format!(
        "<p><strong>Description:</strong><br>{}</p>",
        encode_api_html(&pin.description)
    ));

    if let Some(home_page) = pin
        .home_page
        .as_deref()
        .filter(|link| is_valid_home_page(&decode_api_html(link)))
    {
        let link = encode_api_html(home_page);
        html.push_str(&format!(
            "<p><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a></p>",
            link, link
        ));
    }

    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::geo::Coordinate;
    use chrono::{TimeZone, Utc};

    fn pin() -> Pin {
        Pin {
            protest_id: Some("p1".into()),
            location: Coordinate::new(0.0, 0.0),
            title: "<script>".into(),
            description: "Meet &amp; greet".into(),
            dress_code: None,
            date: Some(Utc.with_ymd_and_hms(2030, 5, 4, 13, 30, 0).unwrap()),
            owner: Some("alice".into()),
            home_page: None,
            recurs_every_days: Some(7),
        }
    }

    #[test]
    fn test_popup_escapes_and_formats() {
        let html = render_popup(&pin());

        assert!(html.contains("<strong>&#x3c;script&#x3e;</strong> - by alice"));
        assert!(html.contains("Saturday, May 4, 2030 at 13:30 UTC"));
        assert!(html.contains("Meet &#x26; greet"));
        assert!(html.contains("7 days"));
        assert!(!html.contains("Dress Code"));
    }

    #[test]
    fn test_location_popup() {
        let mut location = pin();
        location.date = None;

        let html = render_popup(&location);

        assert!(html.contains("Ongoing location"));
        assert!(!html.contains("Repeats"));
    }

    #[test]
    fn test_home_page_link() {
        let mut linked = pin();
        linked.home_page = Some("https://example.org/rally".into());

        let html = render_popup(&linked);

        assert!(html.contains("href=\"https:&#x2f;&#x2f;example.org&#x2f;rally\""));
    }

    #[test]
    fn test_script_home_page_is_not_linked() {
        for link in ["javascript:alert(1)", "data:text/html,hi", "JaVaScRiPt&#x3a;alert(1)"] {
            let mut hostile = pin();
            hostile.home_page = Some(link.into());

            let html = render_popup(&hostile);

            assert!(!html.contains("<a "), "{} was linked", link);
            assert!(!html.contains("href="));
        }
    }
}
