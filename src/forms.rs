//! Registration forms: validation and submission.
//!
//! Each form validates into a field-keyed [`FormErrors`] map; a form with any
//! error is never sent. Field names on the wire match the sheet columns.

use std::collections::BTreeMap;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, LocalCache};
use crate::sheets::{FormEndpoint, FormSink};

pub const REQUIRED_MESSAGE: &str = "This field is required";
pub const OTHER_SEVA_MESSAGE: &str = "Please enter your seva details";
pub const GUARDIAN_MESSAGE: &str = "Please enter Father or Mother name";
pub const SUBMIT_FAILED_MESSAGE: &str = "Failed to submit. Please try again.";
pub const REGISTER_FAILED_MESSAGE: &str = "Failed to register. Please try again.";

/// Minimum age that may register without a parent's name.
pub const GUARDIAN_FREE_AGE: u32 = 15;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, String>);

impl FormErrors {
    pub fn insert(&mut self, field: &str, message: &str) {
        self.0.insert(field.to_owned(), message.to_owned());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn require_all<'a>(&mut self, fields: impl IntoIterator<Item = (&'static str, &'a str)>) {
        for (name, value) in fields {
            if value.trim().is_empty() {
                self.insert(name, REQUIRED_MESSAGE);
            }
        }
    }
}

/// Applies a keystroke-style edit to a digits-only field: non-digit input is
/// refused and the previous value kept.
pub fn accept_digits(previous: &str, incoming: &str) -> String {
    if incoming.chars().all(|c| c.is_ascii_digit()) {
        incoming.to_owned()
    } else {
        previous.to_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Submission<T> {
    Accepted { receipt: T },
    Invalid { errors: FormErrors },
    Failed { message: String },
}

impl<T> Submission<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitiationForm {
    #[serde(rename = "legalName")]
    pub legal_name: String,
    #[serde(rename = "initiatedName")]
    pub initiated_name: String,
    #[serde(rename = "initiationDate")]
    pub initiation_date: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    pub address: String,
    pub country: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[serde(rename = "nearbyCentre")]
    pub nearby_centre: String,
}

impl InitiationForm {
    /// Copy with digits-only fields filtered as they would be on entry.
    pub fn sanitized(mut self) -> Self {
        self.phone_number = accept_digits("", &self.phone_number);
        self
    }

    pub fn fields(&self) -> [(&'static str, &str); 10] {
        [
            ("legalName", self.legal_name.as_str()),
            ("initiatedName", self.initiated_name.as_str()),
            ("initiationDate", self.initiation_date.as_str()),
            ("PhoneNumber", self.phone_number.as_str()),
            ("address", self.address.as_str()),
            ("country", self.country.as_str()),
            ("city", self.city.as_str()),
            ("state", self.state.as_str()),
            ("pincode", self.pincode.as_str()),
            ("nearbyCentre", self.nearby_centre.as_str()),
        ]
    }

    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        errors.require_all(self.fields());
        errors
    }
}

pub async fn submit_initiation(sink: &dyn FormSink, form: InitiationForm) -> Submission<()> {
    let form = form.sanitized();
    let errors = form.validate();
    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), "initiation form has errors; not submitting");
        return Submission::Invalid { errors };
    }

    let pairs = owned_pairs(&form.fields());
    match sink.post_form(FormEndpoint::Initiation, pairs).await {
        Ok(()) => {
            tracing::info!("initiation form submitted");
            Submission::Accepted { receipt: () }
        }
        Err(err) => {
            tracing::warn!(?err, "initiation form submission failed");
            Submission::Failed {
                message: SUBMIT_FAILED_MESSAGE.to_owned(),
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuruPurnimaForm {
    pub name: String,
    pub city: String,
    pub mobile: String,
    #[serde(rename = "visitPlace")]
    pub visit_place: String,
    pub adults: String,
    pub children: String,
}

impl GuruPurnimaForm {
    pub fn sanitized(mut self) -> Self {
        self.mobile = accept_digits("", &self.mobile);
        self
    }

    pub fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("name", self.name.as_str()),
            ("city", self.city.as_str()),
            ("mobile", self.mobile.as_str()),
            ("visitPlace", self.visit_place.as_str()),
            ("adults", self.adults.as_str()),
            ("children", self.children.as_str()),
        ]
    }

    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        errors.require_all(self.fields());
        errors
    }
}

/// A completed Guru Purnima registration, kept under `gp-token-info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuruPurnimaRegistration {
    pub token: String,
    pub form: GuruPurnimaForm,
}

impl GuruPurnimaRegistration {
    pub fn whatsapp_message(&self) -> String {
        let form = &self.form;
        format!(
            "🌸 Shri Radhey Shyam !!\n\
             You are Cordially Invited for Guru Pujan.\n\
             \n\
             🪔 Name: {}\n\
             🏙️ City: {}\n\
             📱 Mobile: {}\n\
             🗓️ Visit Place: {}\n\
             👨‍👩‍👧 Adults: {} | Children: {}\n\
             🎟️ Token: {}",
            form.name,
            form.city,
            form.mobile,
            form.visit_place,
            form.adults,
            form.children,
            self.token
        )
    }

    pub fn whatsapp_link(&self) -> String {
        let mut url = String::from("https://wa.me/?");
        url.push_str(
            &url::form_urlencoded::Serializer::new(String::new())
                .append_pair("text", &self.whatsapp_message())
                .finish(),
        );
        url
    }
}

/// `GP-` followed by a six-digit number.
pub fn new_guru_purnima_token() -> String {
    let n: u32 = rand::random_range(100_000..1_000_000);
    format!("GP-{n}")
}

/// Validates and records a Guru Purnima registration locally. Nothing is
/// posted upstream.
pub async fn register_guru_purnima(
    cache: &LocalCache,
    form: GuruPurnimaForm,
) -> anyhow::Result<Submission<GuruPurnimaRegistration>> {
    let form = form.sanitized();
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(Submission::Invalid { errors });
    }

    let registration = GuruPurnimaRegistration {
        token: new_guru_purnima_token(),
        form,
    };
    cache
        .put(&CacheKey::GuruPurnimaToken, &registration)
        .await
        .context("persist guru purnima registration")?;
    tracing::info!(token = %registration.token, "guru purnima registration saved");
    Ok(Submission::Accepted {
        receipt: registration,
    })
}

pub async fn saved_guru_purnima(cache: &LocalCache) -> anyhow::Result<Option<GuruPurnimaRegistration>> {
    cache.get(&CacheKey::GuruPurnimaToken).await
}

/// Forgets the saved registration so another can be made.
pub async fn reset_guru_purnima(cache: &LocalCache) -> anyhow::Result<()> {
    cache
        .remove(&CacheKey::GuruPurnimaToken)
        .await
        .context("remove guru purnima registration")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventForm {
    pub name: String,
    pub age: String,
    pub gender: String,
    #[serde(rename = "fatherOrMotherName")]
    pub father_or_mother_name: String,
    #[serde(rename = "whatsappMobile")]
    pub whatsapp_mobile: String,
    pub city: String,
    pub seva: String,
    #[serde(rename = "otherSeva")]
    pub other_seva: String,
    #[serde(rename = "visitPlace")]
    pub visit_place: String,
}

impl EventForm {
    pub fn fields(&self) -> [(&'static str, &str); 9] {
        [
            ("name", self.name.as_str()),
            ("age", self.age.as_str()),
            ("gender", self.gender.as_str()),
            ("fatherOrMotherName", self.father_or_mother_name.as_str()),
            ("whatsappMobile", self.whatsapp_mobile.as_str()),
            ("city", self.city.as_str()),
            ("seva", self.seva.as_str()),
            ("otherSeva", self.other_seva.as_str()),
            ("visitPlace", self.visit_place.as_str()),
        ]
    }

    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        errors.require_all(self.fields().into_iter().filter(|(name, _)| *name != "otherSeva"));

        if self.seva == "Others" && self.other_seva.trim().is_empty() {
            errors.insert("otherSeva", OTHER_SEVA_MESSAGE);
        }

        let age = leading_int(&self.age);
        if age.is_some_and(|age| age < i64::from(GUARDIAN_FREE_AGE))
            && self.father_or_mother_name.trim().is_empty()
        {
            errors.insert("fatherOrMotherName", GUARDIAN_MESSAGE);
        }
        errors
    }
}

/// Integer prefix of `raw` after leading whitespace, like a lenient number
/// field.
fn leading_int(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

pub async fn submit_event(sink: &dyn FormSink, form: EventForm) -> Submission<()> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Submission::Invalid { errors };
    }

    let pairs = owned_pairs(&form.fields());
    match sink.post_multipart(FormEndpoint::Event, pairs).await {
        Ok(reply) if reply.get("success").and_then(|v| v.as_bool()) == Some(true) => {
            tracing::info!("event registration submitted");
            Submission::Accepted { receipt: () }
        }
        Ok(reply) => {
            tracing::warn!(%reply, "event registration was not accepted");
            Submission::Failed {
                message: REGISTER_FAILED_MESSAGE.to_owned(),
            }
        }
        Err(err) => {
            tracing::warn!(?err, "event registration submission failed");
            Submission::Failed {
                message: REGISTER_FAILED_MESSAGE.to_owned(),
            }
        }
    }
}

fn owned_pairs(fields: &[(&'static str, &str)]) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::tests::RecordingSink;

    fn initiation() -> InitiationForm {
        InitiationForm {
            legal_name: "Ram Kumar".to_owned(),
            initiated_name: "Radha Das".to_owned(),
            initiation_date: "2024-07-21".to_owned(),
            phone_number: "9540917385".to_owned(),
            address: "Gaur Kripa Dham".to_owned(),
            country: "India".to_owned(),
            city: "Vrindavan".to_owned(),
            state: "Uttar Pradesh".to_owned(),
            pincode: "281121".to_owned(),
            nearby_centre: "Vrindavan".to_owned(),
        }
    }

    fn event() -> EventForm {
        EventForm {
            name: "Gopal".to_owned(),
            age: "16".to_owned(),
            gender: "Male".to_owned(),
            father_or_mother_name: String::new(),
            whatsapp_mobile: "9540917385".to_owned(),
            city: "Delhi".to_owned(),
            seva: "Painting".to_owned(),
            other_seva: String::new(),
            visit_place: "9 July, Vrindavan".to_owned(),
        }
    }

    #[tokio::test]
    async fn empty_legal_name_blocks_submission() {
        let sink = RecordingSink::default();
        let form = InitiationForm {
            legal_name: "  ".to_owned(),
            ..initiation()
        };
        let Submission::Invalid { errors } = submit_initiation(&sink, form).await else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.get("legalName"), Some(REQUIRED_MESSAGE));
        assert_eq!(errors.len(), 1);
        assert!(sink.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn valid_initiation_posts_sheet_field_names() {
        let sink = RecordingSink::default();
        assert!(submit_initiation(&sink, initiation()).await.is_accepted());

        let posts = sink.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, FormEndpoint::Initiation);
        assert_eq!(posts[0].1[3], json!(["PhoneNumber", "9540917385"]));
    }

    #[tokio::test]
    async fn failed_post_reports_retry_message() {
        let sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let outcome = submit_initiation(&sink, initiation()).await;
        assert_eq!(
            outcome,
            Submission::Failed {
                message: SUBMIT_FAILED_MESSAGE.to_owned()
            }
        );
    }

    #[test]
    fn non_digit_phone_is_refused() {
        assert_eq!(accept_digits("95", "95a"), "95");
        assert_eq!(accept_digits("95", "954"), "954");
        let form = InitiationForm {
            phone_number: "+91 954".to_owned(),
            ..initiation()
        }
        .sanitized();
        assert_eq!(form.validate().get("PhoneNumber"), Some(REQUIRED_MESSAGE));
    }

    #[test]
    fn event_form_cross_field_rules() {
        assert!(event().validate().is_empty());

        let others = EventForm {
            seva: "Others".to_owned(),
            ..event()
        };
        assert_eq!(others.validate().get("otherSeva"), Some(OTHER_SEVA_MESSAGE));

        let young = EventForm {
            age: "12".to_owned(),
            ..event()
        };
        assert_eq!(
            young.validate().get("fatherOrMotherName"),
            Some(GUARDIAN_MESSAGE)
        );

        let blank_age = EventForm {
            age: String::new(),
            ..event()
        };
        let errors = blank_age.validate();
        assert_eq!(errors.get("age"), Some(REQUIRED_MESSAGE));
        assert_eq!(errors.get("fatherOrMotherName"), Some(REQUIRED_MESSAGE));
    }

    #[test]
    fn leading_int_reads_numeric_prefix() {
        assert_eq!(leading_int(" 14 years"), Some(14));
        assert_eq!(leading_int("-3"), Some(-3));
        assert_eq!(leading_int("abc"), None);
    }

    #[tokio::test]
    async fn event_submission_requires_success_flag() {
        let sink = RecordingSink::default();
        assert!(submit_event(&sink, event()).await.is_accepted());
        assert_eq!(sink.posts.lock().unwrap()[0].0, FormEndpoint::Event);

        let sink = RecordingSink {
            multipart_reply: Some(json!({ "success": false })),
            ..RecordingSink::default()
        };
        assert_eq!(
            submit_event(&sink, event()).await,
            Submission::Failed {
                message: REGISTER_FAILED_MESSAGE.to_owned()
            }
        );
    }

    #[test]
    fn guru_purnima_tokens_are_six_digits() {
        for _ in 0..200 {
            let token = new_guru_purnima_token();
            let digits = token.strip_prefix("GP-").unwrap();
            assert_eq!(digits.len(), 6, "{token}");
            let number: u32 = digits.parse().unwrap();
            assert!((100_000..1_000_000).contains(&number));
        }
    }

    #[tokio::test]
    async fn guru_purnima_registration_is_saved_and_reset() {
        let cache = LocalCache::in_memory();
        let form = GuruPurnimaForm {
            name: "Shyam".to_owned(),
            city: "Agra".to_owned(),
            mobile: "9540917385".to_owned(),
            visit_place: "Vrindavan".to_owned(),
            adults: "2".to_owned(),
            children: "0".to_owned(),
        };

        let Submission::Accepted { receipt } = register_guru_purnima(&cache, form).await.unwrap()
        else {
            panic!("expected registration");
        };
        let number: u32 = receipt.token.strip_prefix("GP-").unwrap().parse().unwrap();
        assert!((100_000..1_000_000).contains(&number));
        assert!(receipt.whatsapp_message().contains(&format!("Token: {}", receipt.token)));
        assert!(receipt.whatsapp_link().starts_with("https://wa.me/?text="));

        assert_eq!(saved_guru_purnima(&cache).await.unwrap(), Some(receipt));
        reset_guru_purnima(&cache).await.unwrap();
        assert_eq!(saved_guru_purnima(&cache).await.unwrap(), None);
    }

    #[tokio::test]
    async fn guru_purnima_with_blank_fields_is_not_saved() {
        let cache = LocalCache::in_memory();
        let outcome = register_guru_purnima(&cache, GuruPurnimaForm::default())
            .await
            .unwrap();
        let Submission::Invalid { errors } = outcome else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 6);
        assert_eq!(saved_guru_purnima(&cache).await.unwrap(), None);
    }
}
