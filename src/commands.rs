//! CLI command bodies. Each prints a text view, or JSON with `--json`.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::Services;
use crate::catalog::{Catalog, CatalogQuery, cached_catalog};
use crate::cli::{
    BhajansArgs, BooksArgs, CheckoutArgs, DevoteesArgs, FromArgs, GuruPurnimaArgs, KathasArgs,
    KirtansArgs, ReadArgs, SwitchArgs,
};
use crate::directory::{
    DevoteeQuery, DevoteeSort, group_by_state, kirtans_to_csv, query_devotees, search_kirtans,
    sort_kirtans,
};
use crate::forms::{
    EventForm, FormErrors, GuruPurnimaForm, InitiationForm, Submission, register_guru_purnima,
    reset_guru_purnima, saved_guru_purnima, submit_event, submit_initiation,
};
use crate::media::{BhajanQuery, bhajan_categories, filter_bhajans, group_by_category, youtube_embed_url};
use crate::reader::{Cursor, IndexView, PageView};
use crate::routes::Route;
use crate::search::SortDirection;
use crate::store::{Cart, DeliveryDetails, add_to_cart, place_order};

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> anyhow::Result<()> {
    if json {
        let out = serde_json::to_string_pretty(value).context("serialize view")?;
        println!("{out}");
    } else {
        print!("{}", text(value));
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read form: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse form: {}", path.display()))
}

/// Catalog for views that need titles: the cached copy, fetched on first use.
async fn catalog_for_reading(services: &Services) -> Catalog {
    let cached = cached_catalog(&services.cache).await;
    if cached.is_empty() {
        services.catalog.load_or_empty().await
    } else {
        cached
    }
}

pub async fn books(services: &Services, args: BooksArgs, json: bool) -> anyhow::Result<()> {
    let catalog = services.catalog.load_or_empty().await;
    let query = CatalogQuery {
        search: args.search,
        category: args.category,
    };
    let books = catalog.filter(&query);
    emit(json, &books, |books| {
        if books.is_empty() {
            return "No books found.\n".to_owned();
        }
        let mut out = String::new();
        for book in books {
            let _ = writeln!(out, "{}\t{}\t{}", book.book_id, book.title, book.category);
        }
        out
    })
}

pub async fn read(services: &Services, args: ReadArgs, json: bool) -> anyhow::Result<()> {
    catalog_for_reading(services).await;
    match args.page {
        Some(page_id) => {
            // Reading a page selects its book first, which stages it.
            services
                .stager
                .ensure(&args.book, services.config.reader.stage_wait())
                .await;
            open_page(services, &Cursor::new(args.book, page_id), json).await
        }
        None => {
            let view = services.reader.open_index(&args.book).await;
            emit(json, &view, render_index)
        }
    }
}

pub async fn switch(services: &Services, args: SwitchArgs, json: bool) -> anyhow::Result<()> {
    catalog_for_reading(services).await;
    let view = services.reader.switch_book(&args.book).await;
    emit(json, &view, render_index)
}

async fn open_page(services: &Services, cursor: &Cursor, json: bool) -> anyhow::Result<()> {
    let view = services
        .reader
        .open_page(cursor)
        .await
        .with_context(|| format!("open page {}/{}", cursor.book_id, cursor.page_id))?;
    emit(json, &view, |view| match view {
        Some(view) => render_page(view),
        None => "Page not found\n".to_owned(),
    })
}

fn render_index(view: &IndexView) -> String {
    let mut out = format!("{}\n", view.title);
    if view.entries.is_empty() {
        out.push_str("(no pages)\n");
    }
    for entry in &view.entries {
        let _ = writeln!(out, "  {}\t{}", entry.page_id, entry.page_title);
    }
    if let Some(prev) = &view.prev_book {
        let _ = writeln!(out, "prev book: {} ({})", prev.title, prev.book_id);
    }
    if let Some(next) = &view.next_book {
        let _ = writeln!(out, "next book: {} ({})", next.title, next.book_id);
    }
    out
}

fn render_page(view: &PageView) -> String {
    let mut out = format!("{}\n", view.book_title);
    match &view.page {
        Some(page) => {
            match view.position {
                Some(i) => {
                    let _ = writeln!(out, "[{}/{}] {}", i + 1, view.total, page.page_title);
                }
                None => {
                    let _ = writeln!(out, "{}", page.page_title);
                }
            }
            if !page.page_text.is_empty() {
                let _ = writeln!(out, "\n{}", page.page_text);
            }
        }
        None => out.push_str("Page not found\n"),
    }
    if let Some(prev) = &view.prev {
        let _ = writeln!(out, "prev: {} ({})", prev.page_title, prev.page_id);
    }
    if let Some(next) = &view.next {
        let _ = writeln!(out, "next: {} ({})", next.page_title, next.page_id);
    }
    out
}

pub async fn open(services: &Services, path: &str, json: bool) -> anyhow::Result<()> {
    let route = Route::parse(path);
    tracing::debug!(?route, path, "resolved route");
    match route {
        Route::Books => books(services, BooksArgs::default(), json).await,
        Route::BookIndex { book_id } => {
            read(services, ReadArgs { book: book_id, page: None }, json).await
        }
        Route::BookPage { book_id, page_id } => {
            catalog_for_reading(services).await;
            open_page(services, &Cursor::new(book_id, page_id), json).await
        }
        Route::Devotees => devotees(services, DevoteesArgs::default(), json).await,
        Route::EkadashiKirtans => kirtans(services, KirtansArgs::default(), json).await,
        Route::Bhajans => bhajans(services, BhajansArgs::default(), json).await,
        Route::Kathas => kathas(services, KathasArgs::default(), json).await,
        Route::BookStore => store(services, json).await,
        Route::Checkout => cart(services, json).await,
        Route::GuruPurnima => {
            guru_purnima(
                services,
                GuruPurnimaArgs {
                    from: None,
                    reset: false,
                },
                json,
            )
            .await
        }
        other => emit(json, &other, |route| format!("{}\n", route.path())),
    }
}

pub async fn devotees(services: &Services, args: DevoteesArgs, json: bool) -> anyhow::Result<()> {
    let records = services.source.devotees().await.context("load devotees")?;
    let query = DevoteeQuery {
        initiated_name: args.initiated_name,
        city: args.city,
        state: args.state,
        sort: DevoteeSort {
            field: args.sort,
            direction: if args.desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            },
        },
    };
    let rows = query_devotees(&records, &query);
    emit(json, &rows, |rows| {
        let mut out = String::new();
        for r in rows {
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                r.initiated_name, r.legal_name, r.city, r.state, r.phone_number
            );
        }
        let _ = writeln!(out, "{} devotees", rows.len());
        out
    })
}

pub async fn kirtans(services: &Services, args: KirtansArgs, json: bool) -> anyhow::Result<()> {
    let mut records = services
        .source
        .kirtans()
        .await
        .context("load ekadashi kirtans")?;
    sort_kirtans(&mut records);
    let matches = search_kirtans(&records, &args.search);

    if let Some(path) = &args.csv {
        std::fs::write(path, kirtans_to_csv(&matches))
            .with_context(|| format!("write csv: {}", path.display()))?;
        tracing::info!(rows = matches.len(), path = %path.display(), "wrote kirtan csv");
    }

    let groups = group_by_state(&matches);
    emit(json, &groups, |groups| {
        let mut out = String::new();
        for group in groups {
            let _ = writeln!(out, "{}", group.state);
            for r in &group.records {
                let _ = writeln!(out, "  {}\t{}\t{}\t{}", r.name, r.city, r.phone_number, r.timings);
            }
        }
        out
    })
}

pub async fn bhajans(services: &Services, args: BhajansArgs, json: bool) -> anyhow::Result<()> {
    let records = services.source.bhajans().await.context("load bhajans")?;
    let query = BhajanQuery {
        search: args.search,
        category: args.category,
    };
    let matches = filter_bhajans(&records, &query);
    let groups = group_by_category(&matches);

    #[derive(Serialize)]
    struct BhajanView<'a> {
        categories: Vec<String>,
        total: usize,
        groups: &'a std::collections::BTreeMap<String, Vec<&'a crate::formats::BhajanRecord>>,
    }
    let view = BhajanView {
        categories: bhajan_categories(&records),
        total: matches.len(),
        groups: &groups,
    };
    emit(json, &view, |view| {
        let mut out = format!("Showing {} bhajans\n", view.total);
        for (category, items) in view.groups {
            let _ = writeln!(out, "{category}");
            for item in items {
                let _ = writeln!(
                    out,
                    "  {}\t{}",
                    item.title,
                    youtube_embed_url(&item.youtube_link)
                );
            }
        }
        out
    })
}

pub async fn kathas(services: &Services, args: KathasArgs, json: bool) -> anyhow::Result<()> {
    let library = services.source.kathas().await.context("load katha playlist")?;
    let Some(katha_id) = args.katha else {
        return emit(json, &library.kathas, |kathas| {
            let mut out = String::new();
            for k in kathas {
                let _ = writeln!(out, "{}\t{}\t{}\t{}", k.id, k.name, k.date, k.venue);
            }
            out
        });
    };

    let selection = library
        .select(&katha_id, &args.search)
        .with_context(|| format!("unknown katha: {katha_id}"))?;
    emit(json, &selection, |selection| {
        let mut out = format!("{}\n", selection.katha.name);
        if let Some(current) = selection.current {
            let _ = writeln!(
                out,
                "now playing: {}\t{}",
                current.title,
                youtube_embed_url(&current.youtube_link)
            );
        }
        if selection.videos.is_empty() {
            out.push_str("No videos found.\n");
        }
        for video in &selection.videos {
            let _ = writeln!(out, "  {}", video.title);
        }
        out
    })
}

async fn store(services: &Services, json: bool) -> anyhow::Result<()> {
    let books = services.source.store_books().await.context("load book store")?;
    emit(json, &books, |books| {
        let mut out = String::new();
        for b in books {
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t₹{} + ₹{} delivery",
                b.id, b.title, b.author, b.price, b.delivery_charges
            );
        }
        out
    })
}

async fn cart(services: &Services, json: bool) -> anyhow::Result<()> {
    let cart = Cart::load(&services.cache).await.context("load cart")?;
    let totals = cart.totals();
    emit(json, &(&cart, totals), |(cart, totals)| {
        let mut out = String::new();
        for item in &cart.items {
            let _ = writeln!(out, "{} x{}\t₹{}", item.book.title, item.quantity, item.book.price);
        }
        let _ = writeln!(out, "Total Quantity: {}", totals.total_quantity);
        let _ = writeln!(out, "Subtotal: ₹{}", totals.subtotal);
        let _ = writeln!(out, "Delivery Charges: ₹{}", totals.delivery_charge);
        let _ = writeln!(out, "Total Amount: ₹{}", totals.total);
        out
    })
}

/// Prints the outcome; invalid or failed submissions become errors so the
/// process exits non-zero.
fn finish<T: Serialize>(
    json: bool,
    outcome: Submission<T>,
    accepted: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    match &outcome {
        Submission::Accepted { receipt } => emit(json, &outcome, |_| accepted(receipt)),
        Submission::Invalid { errors } => {
            emit(json, &outcome, |_| render_errors(errors))?;
            anyhow::bail!("form has {} invalid field(s)", errors.len())
        }
        Submission::Failed { message } => anyhow::bail!("{message}"),
    }
}

fn render_errors(errors: &FormErrors) -> String {
    let mut out = String::new();
    for (field, message) in errors.iter() {
        let _ = writeln!(out, "{field}: {message}");
    }
    out
}

pub async fn initiation(services: &Services, args: FromArgs, json: bool) -> anyhow::Result<()> {
    let form: InitiationForm = read_json(&args.from)?;
    let outcome = submit_initiation(services.sink.as_ref(), form).await;
    finish(json, outcome, |_| "Form submitted successfully!\n".to_owned())
}

pub async fn event(services: &Services, args: FromArgs, json: bool) -> anyhow::Result<()> {
    let form: EventForm = read_json(&args.from)?;
    let outcome = submit_event(services.sink.as_ref(), form).await;
    finish(json, outcome, |_| "Registration successful!\n".to_owned())
}

pub async fn guru_purnima(services: &Services, args: GuruPurnimaArgs, json: bool) -> anyhow::Result<()> {
    if args.reset {
        reset_guru_purnima(&services.cache).await?;
        println!("Registration cleared.");
        return Ok(());
    }

    let Some(path) = args.from else {
        let saved = saved_guru_purnima(&services.cache)
            .await
            .context("read saved registration")?;
        return emit(json, &saved, |saved| match saved {
            Some(registration) => format!(
                "{}\n{}\n",
                registration.whatsapp_message(),
                registration.whatsapp_link()
            ),
            None => "No registration yet.\n".to_owned(),
        });
    };

    let form: GuruPurnimaForm = read_json(&path)?;
    let outcome = register_guru_purnima(&services.cache, form).await?;
    finish(json, outcome, |registration| {
        format!(
            "{}\n{}\n",
            registration.whatsapp_message(),
            registration.whatsapp_link()
        )
    })
}

pub async fn checkout(services: &Services, args: CheckoutArgs, json: bool) -> anyhow::Result<()> {
    let details: DeliveryDetails = read_json(&args.from)?;

    if let Some(book_id) = &args.book {
        let books = services.source.store_books().await.context("load book store")?;
        let book = books
            .into_iter()
            .find(|b| &b.id == book_id)
            .with_context(|| format!("unknown store book: {book_id}"))?;
        add_to_cart(&services.cache, book, args.quantity).await?;
    }

    let cart = Cart::load(&services.cache).await.context("load cart")?;
    if cart.is_empty() {
        anyhow::bail!("cart is empty; pass --book to add a store book");
    }
    let receipt = place_order(services.sink.as_ref(), &details, &cart).await;
    emit(json, &receipt, |receipt| {
        format!(
            "Order Placed Successfully!\nYour order number is {}\nTotal Amount: ₹{}\n",
            receipt.order_id, receipt.totals.total
        )
    })
}

pub fn chat(message: &str, json: bool) -> anyhow::Result<()> {
    let reply = crate::chatbot::reply(message);
    emit(json, &reply, |reply| match reply {
        Some(reply) => format!("{reply}\n"),
        None => String::new(),
    })
}

pub fn youtube(link: &str, json: bool) -> anyhow::Result<()> {
    let embed = crate::admin::embed_link(link)?;
    emit(json, &embed, |embed| format!("{embed}\n"))
}
