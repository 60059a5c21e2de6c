use crate::api::SignupApi;
use crate::submit::{SignupForm, SubmitOutcome};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Scripted user sessions for the demo binary and integration tests.
/// Each scenario drives the form through the same event stream a real
/// user would produce: focus, per-keystroke input, paste, blur, submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Scenario {
    /// Fill every field correctly and submit once.
    HappyPath,
    /// Submit with a short password and a mismatched confirmation,
    /// then fix both and submit again.
    ValidationRetry,
    /// Paste the email and both passwords instead of typing them.
    PasteHeavy,
    /// Type into two fields, clear one, and walk away without submitting.
    Abandon,
}

/// Identity used to fill the form, generated from a seeded RNG so demo
/// runs are reproducible.
#[derive(Debug, Clone)]
pub struct Persona {
    pub name: String,
    pub email: String,
    pub password: String,
}

const FIRST_NAMES: [&str; 8] = [
    "Jane", "Arjun", "Mei", "Tomas", "Amara", "Lucia", "Kenji", "Noor",
];
const LAST_NAMES: [&str; 8] = [
    "Doe", "Patel", "Chen", "Novak", "Okafor", "Rossi", "Sato", "Haddad",
];

impl Persona {
    pub fn generate(rng: &mut StdRng) -> Self {
        let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
        let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
        Self {
            name: format!("{first} {last}"),
            email: format!(
                "{}.{}{}@example.com",
                first.to_lowercase(),
                last.to_lowercase(),
                rng.gen_range(10..100)
            ),
            password: format!("hunter{}!{}", rng.gen_range(10..100), rng.gen_range(100..1000)),
        }
    }
}

/// Type `text` into `field` one keystroke at a time, bracketed by
/// focus/blur like a real input element.
pub fn type_into<A: SignupApi>(form: &mut SignupForm<A>, field: &str, text: &str) {
    form.focus(field);
    let mut buf = String::new();
    for c in text.chars() {
        buf.push(c);
        form.input(field, &buf);
    }
    form.blur(field);
}

/// Paste `text` into `field` in one go.
pub fn paste_into<A: SignupApi>(form: &mut SignupForm<A>, field: &str, text: &str) {
    form.focus(field);
    form.paste(field);
    form.input(field, text);
    form.blur(field);
}

impl Scenario {
    /// Run the scenario to its end. `None` means the session never reached
    /// a submit (the abandon flow).
    pub fn run<A: SignupApi>(self, form: &mut SignupForm<A>, seed: u64) -> Option<SubmitOutcome> {
        let mut rng = StdRng::seed_from_u64(seed);
        let persona = Persona::generate(&mut rng);

        match self {
            Scenario::HappyPath => {
                type_into(form, "name", &persona.name);
                type_into(form, "email", &persona.email);
                type_into(form, "password", &persona.password);
                type_into(form, "confirmPassword", &persona.password);
                Some(form.submit())
            }
            Scenario::ValidationRetry => {
                type_into(form, "name", &persona.name);
                type_into(form, "email", &persona.email);
                type_into(form, "password", "short");
                type_into(form, "confirmPassword", "different");
                let first = form.submit();
                debug_assert!(matches!(first, SubmitOutcome::ValidationFailed(_)));

                type_into(form, "password", &persona.password);
                type_into(form, "confirmPassword", &persona.password);
                Some(form.submit())
            }
            Scenario::PasteHeavy => {
                type_into(form, "name", &persona.name);
                paste_into(form, "email", &persona.email);
                paste_into(form, "password", &persona.password);
                paste_into(form, "confirmPassword", &persona.password);
                Some(form.submit())
            }
            Scenario::Abandon => {
                type_into(form, "name", &persona.name);
                form.focus("email");
                let mut buf = String::new();
                for c in persona.email.chars().take(5) {
                    buf.push(c);
                    form.input("email", &buf);
                }
                form.input("email", "");
                form.blur("email");
                None
            }
        }
    }
}
