use regex::{Regex, Replacer};
use std::{collections::HashMap, sync::LazyLock};

// From DASH-IF IOP: identifiers are delimited by '$' and substituted as-is.
// The live translation only ever addresses segments by representation id and
// explicit media time, so the width-formatted variants ($Time%05d$ etc.) are
// not recognized here.
//
// Example template: "dash/$RepresentationID$/segment-$Time$.m4s"
static TEMPLATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(RepresentationID|Time)\$").unwrap());

pub struct Template {
    args: HashMap<&'static str, String>,
}

impl Template {
    pub const REPRESENTATION_ID: &'static str = "RepresentationID";
    pub const TIME: &'static str = "Time";

    pub fn new() -> Self {
        Self {
            args: HashMap::with_capacity(2),
        }
    }

    pub fn insert(&mut self, key: &'static str, value: String) -> &mut Self {
        self.args.insert(key, value);
        self
    }

    pub fn resolve(&self, template: &str) -> String {
        TEMPLATE_REGEX
            .replace_all(template, TemplateReplacer(&self.args))
            .to_string()
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}

struct TemplateReplacer<'a>(&'a HashMap<&'a str, String>);

impl Replacer for TemplateReplacer<'_> {
    fn replace_append(&mut self, caps: &regex::Captures<'_>, dst: &mut String) {
        let key = caps.get(1).unwrap().as_str();
        match self.0.get(key) {
            Some(value) => dst.push_str(value),
            None => dst.push_str(caps.get(0).unwrap().as_str()),
        }
    }
}
