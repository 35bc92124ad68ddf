//! `Accept` header parsing and content type selection.

use std::cmp::Ordering;
use std::str::FromStr;

use micro_envelope::envelope::Message;
use micro_envelope::protocol::HttpRequest;
use mime::Mime;

/// One entry of an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRange {
    mime: Mime,
    quality: f32,
}

impl MediaRange {
    pub fn mime(&self) -> &Mime {
        &self.mime
    }

    /// The `q` parameter, `1.0` when absent.
    pub fn quality(&self) -> f32 {
        self.quality
    }

    /// Whether `candidate` falls inside this range. Parameters other than the type and
    /// subtype are not compared.
    pub fn matches(&self, candidate: &Mime) -> bool {
        if self.mime.type_() == mime::STAR {
            return true;
        }
        self.mime.type_() == candidate.type_()
            && (self.mime.subtype() == mime::STAR || self.mime.subtype() == candidate.subtype())
    }

    /// `*/*` is least specific, `type/*` next, a full type the most.
    fn specificity(&self) -> u8 {
        match (self.mime.type_() == mime::STAR, self.mime.subtype() == mime::STAR) {
            (true, _) => 0,
            (false, true) => 1,
            (false, false) => 2,
        }
    }

    fn preference(&self, other: &Self) -> Ordering {
        other.quality.total_cmp(&self.quality).then_with(|| other.specificity().cmp(&self.specificity()))
    }
}

impl FromStr for MediaRange {
    type Err = mime::FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mime = Mime::from_str(s.trim())?;
        let quality = mime
            .get_param("q")
            .and_then(|q| q.as_str().parse::<f32>().ok())
            .filter(|q| q.is_finite())
            .map_or(1.0, |q| q.clamp(0.0, 1.0));
        Ok(Self { mime, quality })
    }
}

/// Parses an `Accept` header into ranges ordered from most to least preferred.
///
/// Higher quality comes first, then the more specific range; ties keep header order.
/// Entries that don't parse and entries with `q=0` are dropped.
pub fn parse_accept(header: &str) -> Vec<MediaRange> {
    let mut ranges = header
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| entry.parse::<MediaRange>().ok())
        .filter(|range| range.quality > 0.0)
        .collect::<Vec<_>>();
    ranges.sort_by(MediaRange::preference);
    ranges
}

/// Picks the first producible type accepted by the most preferred range that accepts any.
pub fn negotiate_content_type<'a>(ranges: &[MediaRange], producible: &'a [Mime]) -> Option<&'a Mime> {
    ranges.iter().find_map(|range| producible.iter().find(|candidate| range.matches(candidate)))
}

/// Negotiates against the request's `Accept` header. Without one, the first producible type
/// wins.
pub fn negotiate<'a>(request: &HttpRequest, producible: &'a [Mime]) -> Option<&'a Mime> {
    match request.header_value(http::header::ACCEPT.as_str()) {
        Some(accept) => negotiate_content_type(&parse_accept(&accept), producible),
        None => producible.first(),
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;

    #[test]
    fn ranges_are_ordered_by_preference() {
        let ranges = parse_accept("text/*;q=0.5, */*;q=0.1, application/json, text/html;level=1, bogus");
        let order: Vec<_> = ranges.iter().map(|range| range.mime().essence_str().to_owned()).collect();
        assert_eq!(order, ["application/json", "text/html", "text/*", "*/*"]);
        assert!((ranges[2].quality() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn picks_the_best_producible_type() {
        let ranges = parse_accept("text/*;q=0.5, application/json, */*;q=0.1");
        let producible = [mime::TEXT_HTML, mime::APPLICATION_JSON];
        assert_eq!(negotiate_content_type(&ranges, &producible), Some(&mime::APPLICATION_JSON));

        let producible = [mime::IMAGE_PNG, mime::TEXT_PLAIN];
        assert_eq!(negotiate_content_type(&ranges, &producible), Some(&mime::TEXT_PLAIN));
    }

    #[test]
    fn subtype_must_match() {
        let ranges = parse_accept("text/html");
        assert_eq!(negotiate_content_type(&ranges, &[mime::TEXT_PLAIN]), None);
        assert_eq!(negotiate_content_type(&ranges, &[mime::TEXT_PLAIN, mime::TEXT_HTML]), Some(&mime::TEXT_HTML));
    }

    #[test]
    fn zero_quality_is_not_acceptable() {
        let ranges = parse_accept("application/json;q=0, image/*");
        assert_eq!(ranges.len(), 1);
        assert_eq!(negotiate_content_type(&ranges, &[mime::APPLICATION_JSON]), None);
        assert_eq!(negotiate_content_type(&ranges, &[mime::IMAGE_PNG]), Some(&mime::IMAGE_PNG));
    }

    #[test]
    fn request_without_accept_takes_first_type() {
        let request = HttpRequest::new(Method::GET, "/".parse().unwrap());
        let producible = [mime::TEXT_PLAIN, mime::APPLICATION_JSON];
        assert_eq!(negotiate(&request, &producible), Some(&mime::TEXT_PLAIN));

        request.header("Accept", "application/*");
        assert_eq!(negotiate(&request, &producible), Some(&mime::APPLICATION_JSON));
        assert_eq!(negotiate(&request, &[]), None);
    }
}
