use folio_core::domain::conversation::OutboundMessage;

pub const SEND_SUCCESS: &str = "✅ Correo enviado correctamente.";
pub const SEND_FAILURE_MARKER: &str = "❌ ";
pub const SEND_FAILURE_DETAIL_CHARS: usize = 140;

pub const FORMAT_PROMPT: &str = "¡Perfecto! Solo necesito tu email y tu mensaje:\n\n\
                                 📧 Formato:\n\
                                 Email: tu@email.com\n\
                                 Mensaje: Tu mensaje aquí";

pub const APOLOGY: &str =
    "Lo siento, ahora mismo no puedo responder. ¿Puedes intentarlo de nuevo en un momento?";

pub fn confirmation_prompt(message: &OutboundMessage) -> String {
    format!(
        "📧 Mensaje listo:\nDe: {}\nAsunto: {}\n¿Enviar? (responde 'sí')",
        message.sender_email, message.subject
    )
}

pub fn body_request(address: &str) -> String {
    format!("📧 Tengo tu email ({address}). ¿Qué mensaje quieres enviarme?")
}

pub fn send_failure(detail: &str) -> String {
    let detail: String = detail.chars().take(SEND_FAILURE_DETAIL_CHARS).collect();
    format!("{SEND_FAILURE_MARKER}{detail}")
}

/// First message shown when a chat opens.
pub fn welcome_message(owner_name: &str) -> String {
    format!(
        "¡Hola! 👋 Soy el asistente personal de **{owner_name}**.\n\n\
         Estoy aquí **24/7** para responder **cualquier pregunta** que tengas sobre {owner_name}:\n\n\
         💼 **Experiencia profesional** - proyectos, tecnologías, roles\n\
         🎓 **Formación académica** - títulos, certificaciones, cursos\n\
         🛠️ **Habilidades técnicas** - lenguajes, frameworks, herramientas\n\
         🚀 **Proyectos realizados** - detalles, tecnologías usadas\n\
         📧 **Contacto directo** - envío de emails inmediato\n\n\
         **Pregúntame lo que quieras** - desde lo más general hasta lo más específico. \
         ¡Estoy aquí para ayudarte! 😊"
    )
}
