// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Trivial templating engine for HTML fragments.

/// Returns the value for `key` in `replacements`, which must appear exactly once.
fn lookup<'a>(replacements: &[(&'static str, &'a str)], key: &str) -> &'a str {
    let mut matches = replacements.iter().filter(|(candidate, _)| *candidate == key);
    let value = match matches.next() {
        Some((_, value)) => *value,
        None => panic!("No replacement for {} but it must have been defined", key),
    };
    assert!(matches.next().is_none(), "Found two values for replacement {}", key);
    value
}

/// Performs various named string replacements in `input` based on `replacements`.
///
/// The `input` string can have `%key%` strings in it where `key` must appear in `replacements` and
/// which will be replaced by its corresponding value.  Raw `%` characters can be escaped via `%%`
/// and nested expansions are not supported.
///
/// Templates are expected to be compiled into the binary, so malformed templates cause a panic.
/// Values are inserted verbatim: use `escape` on any value that comes from user input.
pub fn apply(input: &'static str, replacements: &[(&'static str, &str)]) -> String {
    let mut output = String::with_capacity(input.len());
    let mut in_key = false;
    for chunk in input.split('%') {
        if !in_key {
            output.push_str(chunk);
        } else if chunk.is_empty() {
            output.push('%');
        } else {
            output.push_str(lookup(replacements, chunk));
        }
        in_key = !in_key;
    }
    assert!(in_key, "Unterminated replacement in template");
    output
}

/// Escapes `input` so that it can be embedded in HTML text and in quoted attribute values.
pub fn escape(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#39;"),
            ch => output.push(ch),
        }
    }
    output
}
