use super::json::{find_object, str_field};
use super::normalize::{money_from_json, parse_money};
use super::page::PageView;
use super::Matcher;
use crate::value::FieldValue;
use once_cell::sync::Lazy;
use regex::Regex;

const DEFAULT_CURRENCY: &str = "USD";

static PRICE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[$€£]\s?(?:\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?\s*[mk]\b|\d{4,}(?:\.\d+)?)").unwrap()
});

pub(super) const PRICE: &[Matcher] = &[
    price_from_json_ld,
    price_from_state,
    price_from_meta,
    price_from_facts,
    price_from_text,
];

fn price_from_json_ld(page: &PageView) -> Option<FieldValue> {
    // Offers carry the price on Product / RealEstateListing; some residences put it on the node.
    find_object(page.listing_nodes(), |obj| {
        let currency = str_field(obj, &["priceCurrency"]).unwrap_or(DEFAULT_CURRENCY);
        ["price", "lowPrice"]
            .iter()
            .find_map(|k| obj.get(*k))
            .and_then(|v| money_from_json(v, currency))
    })
    .map(FieldValue::Money)
}

fn price_from_state(page: &PageView) -> Option<FieldValue> {
    find_object(&page.embedded, |obj| {
        let currency = str_field(obj, &["currency", "priceCurrency"]).unwrap_or(DEFAULT_CURRENCY);
        ["price", "listPrice", "unformattedPrice"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(|v| money_from_json(v, currency)))
    })
    .map(FieldValue::Money)
}

fn price_from_meta(page: &PageView) -> Option<FieldValue> {
    let currency = ["product:price:currency", "og:price:currency"]
        .iter()
        .find_map(|k| page.meta(k))
        .or_else(|| page.item_prop("priceCurrency"))
        .unwrap_or(DEFAULT_CURRENCY);
    ["product:price:amount", "og:price:amount"]
        .iter()
        .find_map(|k| page.meta(k))
        .or_else(|| page.item_prop("price"))
        .and_then(|raw| parse_money(raw, currency))
        .map(FieldValue::Money)
}

fn price_from_facts(page: &PageView) -> Option<FieldValue> {
    page.fact(&["list price", "asking price", "price"])
        .and_then(|raw| parse_money(raw, DEFAULT_CURRENCY))
        .map(FieldValue::Money)
}

fn price_from_text(page: &PageView) -> Option<FieldValue> {
    PRICE_TEXT
        .find_iter(&page.text)
        .find_map(|m| parse_money(m.as_str(), DEFAULT_CURRENCY))
        .map(FieldValue::Money)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Money;

    fn page(html: &str) -> PageView {
        PageView::parse(html, None)
    }

    fn money(amount: u64, currency: &str) -> Option<FieldValue> {
        Some(FieldValue::Money(Money {
            amount,
            currency: currency.into(),
        }))
    }

    #[test]
    fn offers_in_json_ld() {
        let p = page(
            r#"<script type="application/ld+json">{"@type":["Product","RealEstateListing"],"offers":{"@type":"Offer","price":"649000","priceCurrency":"CAD"}}</script>"#,
        );
        assert_eq!(price_from_json_ld(&p), money(649_000, "CAD"));
    }

    #[test]
    fn state_blob_skips_junk_prices() {
        let p = page(
            r#"<script id="__NEXT_DATA__" type="application/json">{"a":{"hoa":{"price":250}},"b":{"property":{"price":415000,"currency":"USD"}}}</script>"#,
        );
        assert_eq!(price_from_state(&p), money(415_000, "USD"));
    }

    #[test]
    fn meta_and_microdata() {
        let p = page(r#"<meta property="product:price:amount" content="1250000"><meta property="product:price:currency" content="EUR">"#);
        assert_eq!(price_from_meta(&p), money(1_250_000, "EUR"));
        let p = page(r#"<span itemprop="price" content="389900"></span>"#);
        assert_eq!(price_from_meta(&p), money(389_900, "USD"));
    }

    #[test]
    fn free_text_price() {
        let p = page("<body><p>HOA $250/mo.</p><p>Offered at $1.2M</p></body>");
        assert_eq!(price_from_text(&p), money(1_200_000, "USD"));
        assert_eq!(price_from_text(&page("<body>Contact agent</body>")), None);
    }

    #[test]
    fn free_text_price_without_separators() {
        let p = page("<body><p>Price $425000 3 beds 2 baths</p></body>");
        assert_eq!(price_from_text(&p), money(425_000, "USD"));
        assert_eq!(price_from_text(&page("<body><p>For sale: $425000</p></body>")), money(425_000, "USD"));
        assert_eq!(price_from_text(&page("<body><p>Fee $250 at closing</p></body>")), None);
    }
}
