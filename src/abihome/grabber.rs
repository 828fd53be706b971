use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::abihome::error::{Error, Result};
use crate::abihome::io::Config;
use crate::abihome::sender::{RequestSender, SessionToken};

/// Marker the gallery id trails in a container's `id` attribute.
const GALLERY_ID_MARKER: &str = "entry";

/// Marker the image id trails in a tile's `id` attribute.
const IMAGE_ID_MARKER: &str = "foto";

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("div.album_titel"));
static GALLERY_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("div.one_gallery.entries"));
static IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("div.foto_quader"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

/// A named collection of images as exposed by the portal. The image list is
/// filled in during pagination and never mutated afterward.
#[derive(Debug)]
pub(crate) struct Gallery {
    /// Portal id the gallery is addressed by.
    id: String,
    /// Display title, also used as the output directory name.
    title: String,
    /// Image ids in the order the listing pages returned them.
    images: Vec<String>,
}

impl Gallery {
    fn new(id: String, title: String) -> Self {
        Gallery {
            id,
            title,
            images: Vec::new(),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn title(&self) -> &str {
        &self.title
    }

    pub(crate) fn images(&self) -> &[String] {
        &self.images
    }

    #[cfg(test)]
    pub(crate) fn with_images(id: &str, title: &str, images: &[&str]) -> Self {
        Gallery {
            id: id.to_string(),
            title: title.to_string(),
            images: images.iter().map(|image| image.to_string()).collect(),
        }
    }
}

/// Grabber which is responsible for discovering galleries and the images
/// inside them.
pub(crate) struct Grabber {
    /// The sender used for all portal calls.
    request_sender: RequestSender,
    /// Token accompanying every call.
    token: SessionToken,
    /// Cap on listing pages fetched per gallery.
    max_pages: usize,
}

impl Grabber {
    /// Creates instance of `Self` for grabbing galleries and images.
    pub(crate) fn new(request_sender: RequestSender, token: SessionToken, config: &Config) -> Self {
        Grabber {
            request_sender,
            token,
            max_pages: config.max_pages_per_gallery(),
        }
    }

    /// Discovers all galleries on the portal's listing page.
    pub(crate) fn grab_galleries(&self) -> Result<Vec<Gallery>> {
        let page = self.request_sender.gallery_page(&self.token)?;
        let galleries = parse_gallery_listing(&page)?;
        for gallery in &galleries {
            info!("Found gallery: {}", gallery.title());
        }

        Ok(galleries)
    }

    /// Pages through every gallery's image listing until the server signals
    /// completion with an empty message, filling in the image ids in
    /// encounter order.
    pub(crate) fn grab_images(&self, galleries: &mut [Gallery]) -> Result<()> {
        for gallery in galleries.iter_mut() {
            let mut page = 0;
            loop {
                if page >= self.max_pages {
                    return Err(Error::PageLimitReached {
                        gallery_id: gallery.id.clone(),
                        limit: self.max_pages,
                    });
                }

                let message = self.request_sender.image_batch(&self.token, &gallery.id, page)?;
                if message.is_empty() {
                    info!(
                        "Found {} images in gallery '{}'",
                        gallery.images.len(),
                        gallery.title
                    );
                    break;
                }

                gallery.images.extend(parse_image_batch(&message)?);
                page += 1;
            }
        }

        Ok(())
    }
}

/// Extracts the galleries from the listing page.
///
/// The page exposes titles and gallery containers as two independent element
/// lists that correspond positionally; a length mismatch means the pairing
/// would mis-label galleries, so it is rejected outright.
fn parse_gallery_listing(page: &str) -> Result<Vec<Gallery>> {
    let document = Html::parse_document(page);

    let titles: Vec<String> = document
        .select(&TITLE_SELECTOR)
        .map(|title| title.text().collect::<String>().trim().to_string())
        .collect();
    let entries: Vec<_> = document.select(&GALLERY_SELECTOR).collect();

    if titles.len() != entries.len() {
        return Err(Error::ListingMismatch {
            titles: titles.len(),
            entries: entries.len(),
        });
    }

    titles
        .into_iter()
        .zip(entries)
        .map(|(title, entry)| {
            let id = strip_id_marker(entry.value().attr("id"), GALLERY_ID_MARKER)?;
            Ok(Gallery::new(id, title))
        })
        .collect()
}

/// Extracts the image ids from one listing fragment, in document order.
fn parse_image_batch(fragment: &str) -> Result<Vec<String>> {
    let fragment = Html::parse_fragment(fragment);
    fragment
        .select(&IMAGE_SELECTOR)
        .map(|tile| strip_id_marker(tile.value().attr("id"), IMAGE_ID_MARKER))
        .collect()
}

/// Derives an entity id from an `id` attribute by dropping everything up to
/// and including `marker`.
fn strip_id_marker(attribute: Option<&str>, marker: &'static str) -> Result<String> {
    let attribute = attribute.ok_or(Error::MissingIdAttribute { marker })?;
    attribute
        .split_once(marker)
        .map(|(_, id)| id.to_string())
        .ok_or_else(|| Error::IdMarkerNotFound {
            attribute: attribute.to_string(),
            marker,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abihome::sender::test_support::{sender_for, token};
    use serde_json::json;
    use tokio::runtime::Runtime;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = r#"
        <html><body>
            <div class="album_titel"> Prom </div>
            <div class="one_gallery entries" id="gallery_entry1"></div>
            <div class="album_titel">Graduation</div>
            <div class="one_gallery entries" id="gallery_entry2"></div>
        </body></html>
    "#;

    #[test]
    fn test_listing_pairs_titles_with_entries() {
        let galleries = parse_gallery_listing(LISTING).unwrap();

        assert_eq!(galleries.len(), 2);
        assert_eq!(galleries[0].id(), "1");
        assert_eq!(galleries[0].title(), "Prom");
        assert_eq!(galleries[1].id(), "2");
        assert_eq!(galleries[1].title(), "Graduation");
    }

    #[test]
    fn test_listing_ignores_unrelated_elements() {
        let page = r#"
            <div class="album_titel">Prom</div>
            <div class="one_gallery" id="gallery_entry9"></div>
            <div class="one_gallery entries" id="gallery_entry1"></div>
            <div class="banner">noise</div>
        "#;

        let galleries = parse_gallery_listing(page).unwrap();

        assert_eq!(galleries.len(), 1);
        assert_eq!(galleries[0].id(), "1");
    }

    #[test]
    fn test_listing_mismatch_is_rejected() {
        let page = r#"
            <div class="album_titel">Prom</div>
            <div class="album_titel">Graduation</div>
            <div class="one_gallery entries" id="gallery_entry1"></div>
        "#;

        match parse_gallery_listing(page) {
            Err(Error::ListingMismatch { titles, entries }) => {
                assert_eq!(titles, 2);
                assert_eq!(entries, 1);
            }
            other => panic!("Expected a listing mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_listing_yields_no_galleries() {
        let galleries = parse_gallery_listing("<html><body></body></html>").unwrap();

        assert!(galleries.is_empty());
    }

    #[test]
    fn test_image_batch_extracts_ids_in_order() {
        let fragment = r#"
            <div class="foto_quader" id="foto10"></div>
            <div class="foto_quader" id="foto11"></div>
            <div class="other"></div>
            <div class="foto_quader" id="foto12"></div>
        "#;

        let ids = parse_image_batch(fragment).unwrap();

        assert_eq!(ids, vec!["10", "11", "12"]);
    }

    #[test]
    fn test_strip_id_marker_drops_everything_through_marker() {
        assert_eq!(strip_id_marker(Some("gallery_entry42"), "entry").unwrap(), "42");
        assert_eq!(strip_id_marker(Some("foto123"), "foto").unwrap(), "123");
    }

    #[test]
    fn test_strip_id_marker_requires_marker() {
        match strip_id_marker(Some("gallery_42"), "entry") {
            Err(Error::IdMarkerNotFound { attribute, marker }) => {
                assert_eq!(attribute, "gallery_42");
                assert_eq!(marker, "entry");
            }
            other => panic!("Expected a marker error, got {other:?}"),
        }
    }

    #[test]
    fn test_strip_id_marker_requires_attribute() {
        assert!(matches!(
            strip_id_marker(None, "entry"),
            Err(Error::MissingIdAttribute { marker: "entry" })
        ));
    }

    fn mock_portal() -> (Runtime, MockServer) {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        (rt, server)
    }

    fn image_page(rt: &Runtime, server: &MockServer, page: &str, message: &str) {
        rt.block_on(
            Mock::given(method("POST"))
                .and(path("/ajax.php"))
                .and(query_param("aktion", "load_fotos"))
                .and(query_param("id", "1"))
                .and(query_param("page", page))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "payload": { "message": message }
                })))
                .expect(1)
                .mount(server),
        );
    }

    fn config_with_page_cap(cap: usize) -> Config {
        serde_json::from_value(json!({ "maxPagesPerGallery": cap })).unwrap()
    }

    #[test]
    fn test_pagination_accumulates_until_empty_message() {
        let (rt, server) = mock_portal();
        image_page(&rt, &server, "0", "<div class=\"foto_quader\" id=\"foto10\"></div>");
        image_page(&rt, &server, "1", "<div class=\"foto_quader\" id=\"foto11\"></div>");
        image_page(&rt, &server, "2", "");

        let sender = sender_for(&Config::default(), server.uri());
        let grabber = Grabber::new(sender, token(), &Config::default());
        let mut galleries = vec![Gallery::new("1".to_string(), "Prom".to_string())];

        grabber.grab_images(&mut galleries).unwrap();

        assert_eq!(galleries[0].images(), ["10", "11"]);
    }

    #[test]
    fn test_pagination_respects_page_cap() {
        let (rt, server) = mock_portal();
        rt.block_on(
            Mock::given(method("POST"))
                .and(path("/ajax.php"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "payload": { "message": "<div class=\"foto_quader\" id=\"foto10\"></div>" }
                })))
                .mount(&server),
        );

        let sender = sender_for(&Config::default(), server.uri());
        let grabber = Grabber::new(sender, token(), &config_with_page_cap(2));
        let mut galleries = vec![Gallery::new("1".to_string(), "Prom".to_string())];

        match grabber.grab_images(&mut galleries) {
            Err(Error::PageLimitReached { gallery_id, limit }) => {
                assert_eq!(gallery_id, "1");
                assert_eq!(limit, 2);
            }
            other => panic!("Expected the page cap to trip, got {other:?}"),
        }
    }

    #[test]
    fn test_pagination_stops_at_gallery_with_no_images() {
        let (rt, server) = mock_portal();
        image_page(&rt, &server, "0", "");

        let sender = sender_for(&Config::default(), server.uri());
        let grabber = Grabber::new(sender, token(), &Config::default());
        let mut galleries = vec![Gallery::new("1".to_string(), "Prom".to_string())];

        grabber.grab_images(&mut galleries).unwrap();

        assert!(galleries[0].images().is_empty());
    }

    #[test]
    fn test_grab_galleries_discovers_from_listing_page() {
        let (rt, server) = mock_portal();
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/fotos"))
                .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
                .mount(&server),
        );

        let sender = sender_for(&Config::default(), server.uri());
        let grabber = Grabber::new(sender, token(), &Config::default());
        let galleries = grabber.grab_galleries().unwrap();

        assert_eq!(galleries.len(), 2);
        assert_eq!(galleries[0].title(), "Prom");
    }

    #[test]
    fn test_grab_galleries_surfaces_unexpected_status() {
        let (rt, server) = mock_portal();
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/fotos"))
                .respond_with(ResponseTemplate::new(502))
                .mount(&server),
        );

        let sender = sender_for(&Config::default(), server.uri());
        let grabber = Grabber::new(sender, token(), &Config::default());

        assert!(matches!(
            grabber.grab_galleries(),
            Err(Error::Transport { .. })
        ));
    }
}
