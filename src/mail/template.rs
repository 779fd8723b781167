use time::{macros::format_description, OffsetDateTime};

use super::MagicLinkEmail;
use crate::store::MagicLinkPurpose;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub fn subject(purpose: MagicLinkPurpose) -> &'static str {
    match purpose {
        MagicLinkPurpose::Register => "Lengkapi pendaftaran Rakamin kamu",
        MagicLinkPurpose::Login => "Link masuk ke akun Rakamin kamu",
    }
}

/// Remaining validity rounded to whole minutes, never below one.
pub fn expire_duration(expires_at: OffsetDateTime, now: OffsetDateTime) -> String {
    let seconds = (expires_at - now).as_seconds_f64();
    let minutes = ((seconds / 60.0).round() as i64).max(1);
    format!("{minutes} menit")
}

pub fn render(email: &MagicLinkEmail, now: OffsetDateTime) -> RenderedEmail {
    let subject = subject(email.purpose);
    let expire_duration = expire_duration(email.expires_at, now);
    let action = match email.purpose {
        MagicLinkPurpose::Register => "pendaftaran",
        MagicLinkPurpose::Login => "masuk",
    };
    let to = escape_html(&email.to);
    let url = escape_html(&email.url);
    let year = now.year();

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="id">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{subject}</title>
    <style>
      body {{ font-family: 'Inter', -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; background: #f3f4f6; padding: 32px; }}
      .wrapper {{ max-width: 600px; margin: 0 auto; background: #ffffff; border-radius: 16px; overflow: hidden; }}
      .header {{ background: #111827; padding: 32px; text-align: center; }}
      .content {{ padding: 36px 40px; color: #111827; }}
      p {{ line-height: 1.6; margin: 12px 0; color: #4b5563; }}
      .button {{ display: inline-block; margin: 32px 0; padding: 14px 28px; border-radius: 12px; background: #01959f; color: #ffffff; text-decoration: none; font-weight: 600; }}
      .footer {{ padding: 24px 40px 40px; background: #f9fafb; font-size: 12px; color: #6b7280; }}
      .link {{ color: #01959f; font-weight: 500; word-break: break-all; }}
    </style>
  </head>
  <body>
    <div class="wrapper">
      <div class="header">
        <img src="https://rakamin.com/_nuxt/img/logo-rakamin.373acae.svg" alt="Rakamin" width="120" />
      </div>
      <div class="content">
        <h1>Masuk ke Rakamin</h1>
        <p>Hai {to},</p>
        <p>Berikut adalah link {action} yang kamu minta. Klik tombol di bawah untuk melanjutkan ke Rakamin.</p>
        <p style="color:#ef4444; font-weight:500; margin-top: 24px;">Link ini hanya bisa dipakai selama {expire_duration}.</p>
        <a class="button" href="{url}">Masuk ke Rakamin</a>
        <p>Jika tombol di atas tidak bekerja, salin dan tempel URL berikut di browser kamu:</p>
        <p class="link">{url}</p>
        <p>Kalau kamu tidak merasa meminta link ini, abaikan saja email ini.</p>
      </div>
      <div class="footer">
        PT. Rakamin Kolektif Madani<br />
        &copy; {year} Rakamin. All rights reserved.
      </div>
    </div>
  </body>
</html>
"#
    );

    let valid_until = email
        .expires_at
        .format(format_description!(
            "[day]/[month]/[year] [hour]:[minute] UTC"
        ))
        .unwrap_or_else(|_| email.expires_at.to_string());

    let text = [
        format!("Hai {},", email.to),
        String::new(),
        "Berikut adalah link yang kamu minta untuk masuk ke Rakamin.".to_string(),
        email.url.clone(),
        String::new(),
        format!("Link berlaku sampai {valid_until}."),
        "Kalau kamu tidak merasa meminta link ini, abaikan saja email ini.".to_string(),
    ]
    .join("\n");

    RenderedEmail {
        subject: subject.to_string(),
        html,
        text,
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
