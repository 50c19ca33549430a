use crate::config::CompilerConfig;

/// "Did you mean" candidates for a misspelled name.
pub struct Suggestions;

impl Suggestions {
    /// American soundex code, four characters.
    pub fn soundex(word: &str) -> String {
        fn digit(c: char) -> Option<char> {
            match c {
                'b' | 'f' | 'p' | 'v' => Some('1'),
                'c' | 'g' | 'j' | 'k' | 'q' | 's' | 'x' | 'z' => Some('2'),
                'd' | 't' => Some('3'),
                'l' => Some('4'),
                'm' | 'n' => Some('5'),
                'r' => Some('6'),
                _ => None,
            }
        }

        let mut letters = word.chars().filter(|c| c.is_ascii_alphabetic()).map(|c| c.to_ascii_lowercase());
        let Some(first) = letters.next() else {
            return String::new();
        };

        let mut code = String::with_capacity(4);
        code.push(first.to_ascii_uppercase());
        let mut last = digit(first);
        for c in letters {
            let d = digit(c);
            if d.is_some() && d != last {
                if let Some(d) = d {
                    code.push(d);
                }
                if code.len() == 4 {
                    break;
                }
            }
            // h and w do not separate equal codes
            if c != 'h' && c != 'w' {
                last = d;
            }
        }
        while code.len() < 4 {
            code.push('0');
        }
        code
    }

    /// Candidates sounding like `name` or within the configured edit distance,
    /// closest first.
    pub fn for_name<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>, config: &CompilerConfig) -> Vec<String> {
        let target = name.to_lowercase();
        let target_code = Self::soundex(name);
        let mut scored: Vec<(usize, String)> = candidates
            .into_iter()
            .filter(|c| *c != name)
            .filter_map(|c| {
                let distance = strsim::levenshtein(&target, &c.to_lowercase());
                let sounds_alike = !target_code.is_empty() && Self::soundex(c) == target_code;
                (distance <= config.suggestion_distance || sounds_alike).then(|| (distance, c.to_string()))
            })
            .collect();
        scored.sort();
        scored.dedup_by(|a, b| a.1 == b.1);
        scored.into_iter().take(config.max_suggestions).map(|(_, c)| c).collect()
    }
}
