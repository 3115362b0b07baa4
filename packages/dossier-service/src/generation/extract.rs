/// Returns the last balanced top-level JSON object in `raw`.
///
/// Braces inside JSON strings are ignored, escapes included. Text around the object, such as
/// prose or code fences, is skipped. An object that never closes yields nothing.
pub fn last_json_object(raw: &str) -> Option<&str> {
	let mut depth = 0_usize;
	let mut in_string = false;
	let mut escaped = false;
	let mut start = 0_usize;
	let mut last = None;

	for (idx, byte) in raw.bytes().enumerate() {
		if depth == 0 {
			if byte == b'{' {
				depth = 1;
				start = idx;
			}

			continue;
		}
		if in_string {
			match byte {
				_ if escaped => escaped = false,
				b'\\' => escaped = true,
				b'"' => in_string = false,
				_ => {},
			}

			continue;
		}

		match byte {
			b'"' => in_string = true,
			b'{' => depth += 1,
			b'}' => {
				depth -= 1;

				if depth == 0 {
					last = Some(&raw[start..=idx]);
				}
			},
			_ => {},
		}
	}

	last
}
