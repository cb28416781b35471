use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;

/// Bytes escaped in an id path segment: everything but unreserved characters.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Every page the site serves. Unknown paths resolve to [`Route::Home`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Route {
    Home,
    Schedule,
    Festivals,
    Donations,
    Programs,
    InitiationForm,
    Devotees,
    EkadashiKirtans,
    GuruPurnima,
    GuruPurnimaEvent,
    Bhajans,
    Kathas,
    Books,
    BookIndex { book_id: String },
    BookPage { book_id: String, page_id: String },
    BookStore,
    Checkout,
    Admin,
}

fn static_route(segment: &str) -> Option<Route> {
    let route = match segment.to_ascii_lowercase().as_str() {
        "schedule" => Route::Schedule,
        "festivals" => Route::Festivals,
        "donations" => Route::Donations,
        "programs" => Route::Programs,
        "initiationform" => Route::InitiationForm,
        "devotees" => Route::Devotees,
        "ekadashi-kirtans" => Route::EkadashiKirtans,
        "guru-purnima" => Route::GuruPurnima,
        "guru-purnima-event" => Route::GuruPurnimaEvent,
        "bhajans" => Route::Bhajans,
        "kathas" => Route::Kathas,
        "books" => Route::Books,
        "bookstore" => Route::BookStore,
        "checkout" => Route::Checkout,
        "admintesting1234" => Route::Admin,
        _ => return None,
    };
    Some(route)
}

/// Percent-decoded segment; kept raw when the bytes are not UTF-8.
fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_owned())
}

impl Route {
    /// Resolves a request path. Static segments match without regard to
    /// case; query, fragment and trailing slashes are ignored.
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(decode_segment)
            .collect::<Vec<_>>();

        match segments.as_slice() {
            [] => Self::Home,
            [name] => static_route(name).unwrap_or(Self::Home),
            [book, book_id] if book.eq_ignore_ascii_case("book") => Self::BookIndex {
                book_id: book_id.clone(),
            },
            [book, book_id, page, page_id]
                if book.eq_ignore_ascii_case("book") && page.eq_ignore_ascii_case("page") =>
            {
                Self::BookPage {
                    book_id: book_id.clone(),
                    page_id: page_id.clone(),
                }
            }
            _ => Self::Home,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".to_owned(),
            Self::Schedule => "/schedule".to_owned(),
            Self::Festivals => "/festivals".to_owned(),
            Self::Donations => "/donations".to_owned(),
            Self::Programs => "/programs".to_owned(),
            Self::InitiationForm => "/InitiationForm".to_owned(),
            Self::Devotees => "/devotees".to_owned(),
            Self::EkadashiKirtans => "/ekadashi-kirtans".to_owned(),
            Self::GuruPurnima => "/guru-purnima".to_owned(),
            Self::GuruPurnimaEvent => "/guru-purnima-event".to_owned(),
            Self::Bhajans => "/bhajans".to_owned(),
            Self::Kathas => "/kathas".to_owned(),
            Self::Books => "/books".to_owned(),
            Self::BookIndex { book_id } => {
                format!("/book/{}", utf8_percent_encode(book_id, SEGMENT))
            }
            Self::BookPage { book_id, page_id } => format!(
                "/book/{}/page/{}",
                utf8_percent_encode(book_id, SEGMENT),
                utf8_percent_encode(page_id, SEGMENT)
            ),
            Self::BookStore => "/bookstore".to_owned(),
            Self::Checkout => "/checkout".to_owned(),
            Self::Admin => "/admintesting1234".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_paths_resolve_and_round_trip() {
        let routes = [
            Route::Schedule,
            Route::Festivals,
            Route::Donations,
            Route::Programs,
            Route::InitiationForm,
            Route::Devotees,
            Route::EkadashiKirtans,
            Route::GuruPurnima,
            Route::GuruPurnimaEvent,
            Route::Bhajans,
            Route::Kathas,
            Route::Books,
            Route::BookStore,
            Route::Checkout,
            Route::Admin,
        ];
        for route in routes {
            assert_eq!(Route::parse(&route.path()), route);
        }
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse("/InitiationForm/"), Route::InitiationForm);
        assert_eq!(Route::parse("/initiationform"), Route::InitiationForm);
    }

    #[test]
    fn book_paths_carry_ids() {
        assert_eq!(
            Route::parse("/book/B1"),
            Route::BookIndex {
                book_id: "B1".to_owned()
            }
        );
        assert_eq!(
            Route::parse("/book/B1/page/P2?x=1"),
            Route::BookPage {
                book_id: "B1".to_owned(),
                page_id: "P2".to_owned()
            }
        );
    }

    #[test]
    fn book_ids_are_percent_decoded() {
        let route = Route::parse("/book/B%201/page/P%2F2");
        assert_eq!(
            route,
            Route::BookPage {
                book_id: "B 1".to_owned(),
                page_id: "P/2".to_owned()
            }
        );
        assert_eq!(route.path(), "/book/B%201/page/P%2F2");
        assert_eq!(Route::parse(&route.path()), route);

        assert_eq!(
            Route::parse("/book/%E0%A4%97%E0%A5%80%E0%A4%A4%E0%A4%BE"),
            Route::BookIndex {
                book_id: "गीता".to_owned()
            }
        );
        // Not UTF-8 once decoded: the raw segment is kept.
        assert_eq!(
            Route::parse("/book/%FF"),
            Route::BookIndex {
                book_id: "%FF".to_owned()
            }
        );
        assert_eq!(Route::parse("/Ekadashi%2Dkirtans"), Route::EkadashiKirtans);
    }

    #[test]
    fn unknown_paths_fall_back_to_home() {
        assert_eq!(Route::parse("/nope"), Route::Home);
        assert_eq!(Route::parse("/book/B1/page"), Route::Home);
        assert_eq!(Route::parse("/book"), Route::Home);
    }
}
