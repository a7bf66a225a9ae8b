//! Email bodies.

/// A rendered email ready to send.
pub struct EmailTemplate {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

/// Render the verification-code email.
#[must_use]
pub fn verification_code_email(to: &str, code: &str, ttl_minutes: i64) -> EmailTemplate {
    EmailTemplate {
        to: to.to_string(),
        subject: "Tu código de verificación".to_string(),
        body: format!(
            "Tu código de verificación es: {code}\n\n\
             Este código expira en {ttl_minutes} minutos.\n\
             Si no solicitaste este código, ignora este mensaje.\n"
        ),
    }
}

/// Render the registration-complete email.
#[must_use]
pub fn registration_complete_email(to: &str, first_name: Option<&str>) -> EmailTemplate {
    let greeting = match first_name {
        Some(name) => format!("Hola {name},"),
        None => "Hola,".to_string(),
    };
    EmailTemplate {
        to: to.to_string(),
        subject: "Registro completado".to_string(),
        body: format!(
            "{greeting}\n\n\
             Tu registro profesional fue verificado y tu cuenta está activa.\n\
             Ya puedes iniciar sesión.\n"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_email_contains_code_and_ttl() {
        let email = verification_code_email("ana@example.com", "123456", 15);
        assert_eq!(email.to, "ana@example.com");
        assert!(email.body.contains("123456"));
        assert!(email.body.contains("15 minutos"));
    }

    #[test]
    fn test_welcome_email_greets_by_name_when_known() {
        let email = registration_complete_email("ana@example.com", Some("Ana"));
        assert!(email.body.starts_with("Hola Ana,"));

        let anonymous = registration_complete_email("ana@example.com", None);
        assert!(anonymous.body.starts_with("Hola,"));
    }
}
