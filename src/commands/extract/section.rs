use super::catalog::SectionConfig;

/// Finds every occurrence of a configured section. A section starts on the
/// line after a start-marker match and runs to the first stop-marker match
/// (or, for repeated sections, the next start marker), else to end of
/// document. An absent section yields no occurrences, never an error.
pub(crate) fn locate_sections(lines: &[String], cfg: &SectionConfig) -> Vec<Vec<String>> {
    let mut sections = Vec::new();
    let mut cursor = 0usize;

    while cursor < lines.len() {
        let Some(start) = find_marker(lines, cursor, cfg.start_markers) else {
            break;
        };

        let body_start = start + 1;
        let stop = find_marker(lines, body_start, cfg.stop_markers);
        let next_start = if cfg.repeated {
            find_marker(lines, body_start, cfg.start_markers)
        } else {
            None
        };

        let end = match (stop, next_start) {
            (Some(stop), Some(next)) => stop.min(next),
            (Some(stop), None) => stop,
            (None, Some(next)) => next,
            (None, None) => lines.len(),
        };

        let mut section: Vec<String> = lines[body_start..end]
            .iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();

        while section
            .first()
            .map(|line| is_header_line(line, cfg))
            .unwrap_or(false)
        {
            section.remove(0);
        }

        sections.push(section);

        if !cfg.repeated {
            break;
        }
        cursor = end.max(body_start);
    }

    sections
}

fn find_marker(lines: &[String], from: usize, markers: &[&str]) -> Option<usize> {
    if markers.is_empty() {
        return None;
    }

    lines.iter().enumerate().skip(from).find_map(|(index, line)| {
        let lowered = line.to_lowercase();
        if markers.iter().any(|marker| lowered.contains(marker)) {
            Some(index)
        } else {
            None
        }
    })
}

/// A column-title row repeats the schema's header vocabulary ("Coverage",
/// "Limit Deductible Premium", ...) and carries no data.
pub(crate) fn is_header_line(line: &str, cfg: &SectionConfig) -> bool {
    let lowered = line.trim().to_lowercase();
    if lowered.is_empty() {
        return true;
    }

    if cfg
        .header_prefixes
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return true;
    }

    if cfg.header_words.iter().any(|word| lowered == *word) {
        return true;
    }

    let mut saw_token = false;
    for token in lowered.split_whitespace() {
        let token = token.trim_matches([',', '&', ':', ';', '(', ')', '/']);
        if token.is_empty() {
            continue;
        }
        if !cfg.header_words.contains(&token) {
            return false;
        }
        saw_token = true;
    }

    saw_token
}
